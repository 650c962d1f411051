use super::{
    CompletedPart, DirectGrant, FileSource, PartTransport, SessionGrant, UploadApi, UploadRequest,
};
use crate::services::coordinator::DirectUploadAuth;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// The admin upload REST surface, reached with a bearer token.
pub struct HttpUploadApi {
    http: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct DirectUploadResponse {
    #[serde(flatten)]
    authorization: DirectUploadAuth,
    #[serde(rename = "s3Key")]
    s3_key: String,
    #[serde(rename = "fileUrl")]
    file_url: String,
}

#[derive(Deserialize)]
struct InitResponse {
    #[serde(rename = "uploadId")]
    upload_id: String,
    #[serde(rename = "s3Key")]
    s3_key: String,
    #[serde(rename = "fileUrl")]
    file_url: String,
}

#[derive(Deserialize)]
struct PresignResponse {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
}

#[derive(Deserialize)]
struct CompleteResponse {
    #[serde(rename = "fileUrl")]
    file_url: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
}

impl HttpUploadApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string());
            bail!("{path} rejected: {message}");
        }

        Ok(response
            .json()
            .await
            .with_context(|| format!("malformed response from {path}"))?)
    }
}

#[async_trait]
impl UploadApi for HttpUploadApi {
    async fn begin_direct_upload(&self, request: &UploadRequest) -> Result<DirectGrant> {
        let res: DirectUploadResponse = self
            .post_json(
                "/admin/videos/upload",
                json!({
                    "filename": request.file_name,
                    "contentType": request.content_type,
                    "folder": request.folder,
                }),
            )
            .await?;

        Ok(DirectGrant {
            authorization: res.authorization,
            key: res.s3_key,
            file_url: res.file_url,
        })
    }

    async fn init_session(&self, request: &UploadRequest) -> Result<SessionGrant> {
        let res: InitResponse = self
            .post_json(
                "/admin/videos/multipart/init",
                json!({
                    "filename": request.file_name,
                    "contentType": request.content_type,
                    "folder": request.folder,
                }),
            )
            .await?;

        Ok(SessionGrant {
            upload_id: res.upload_id,
            key: res.s3_key,
            file_url: res.file_url,
        })
    }

    async fn presign_part(
        &self,
        upload_id: &str,
        key: &str,
        part_number: i32,
    ) -> Result<String> {
        let res: PresignResponse = self
            .post_json(
                "/admin/videos/multipart/presign",
                json!({
                    "uploadId": upload_id,
                    "s3Key": key,
                    "partNumber": part_number,
                }),
            )
            .await?;
        Ok(res.upload_url)
    }

    async fn complete_session(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<String> {
        let res: CompleteResponse = self
            .post_json(
                "/admin/videos/multipart/complete",
                json!({
                    "uploadId": upload_id,
                    "s3Key": key,
                    "parts": parts,
                }),
            )
            .await?;
        Ok(res.file_url)
    }

    async fn abort_session(&self, upload_id: &str, key: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_json(
                "/admin/videos/multipart/abort",
                json!({
                    "uploadId": upload_id,
                    "s3Key": key,
                }),
            )
            .await?;
        Ok(())
    }
}

/// Raw transfers against presigned storage URLs.
pub struct HttpPartTransport {
    http: Client,
}

impl HttpPartTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for HttpPartTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartTransport for HttpPartTransport {
    async fn put(
        &self,
        url: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<Option<String>> {
        let mut request = self.http.put(url).body(body);
        if let Some(ct) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct);
        }

        let response = request.send().await.context("storage transfer failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("storage rejected the transfer: {status}");
        }

        // The integrity tag comes back exactly as the backend produced it
        // (quotes included) and is echoed verbatim at completion.
        Ok(response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()))
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &HashMap<String, String>,
        file_name: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<()> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        // The file part goes last; storage POST policies require it
        let part = reqwest::multipart::Part::stream(body)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .context("invalid content type")?;
        form = form.part("file", part);

        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("storage transfer failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("storage rejected the transfer: {status}");
        }
        Ok(())
    }
}

/// Range reads over a local file, one short-lived handle per read so the
/// source stays shareable.
pub struct LocalFileSource {
    path: PathBuf,
    len: u64,
}

impl LocalFileSource {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&path).await?.len();
        Ok(Self { path, len })
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&self, offset: u64, len: u64) -> std::io::Result<Bytes> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}
