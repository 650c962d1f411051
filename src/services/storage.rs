use crate::config::StorageConfig;
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::time::Duration;

/// Characters left verbatim when building public object URLs. Mirrors
/// `encodeURIComponent` with the path separator added back.
const KEY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Everything the platform needs from object storage. The server side only
/// ever issues authorizations against this trait; file bytes never flow
/// through the backend.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    fn bucket(&self) -> &str;

    /// Public (unsigned) URL of an object, used as the persisted catalog URL.
    fn public_url(&self, key: &str) -> String;

    /// Presigned single-shot PUT for the direct upload path.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in_secs: u64,
    ) -> Result<String>;

    /// Presigned GET for purchase-gated streaming.
    async fn presign_get(
        &self,
        key: &str,
        expires_in_secs: u64,
        content_type: &str,
        content_disposition: &str,
    ) -> Result<String>;

    /// Open a multipart session; `None` when the backend answers without an
    /// upload id.
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<Option<String>>;

    /// Presigned single-use URL for one exact part of an open session.
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in_secs: u64,
    ) -> Result<String>;

    /// Finalize a session from (part number, integrity tag) pairs. The pairs
    /// must already be sorted ascending; the backend rejects gaps and
    /// duplicates.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<(i32, String)>,
    ) -> Result<()>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()>;
}

pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3ObjectStorage {
    pub fn new(client: Client, config: &StorageConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        }
    }

    fn presigning(&self, expires_in_secs: u64) -> Result<PresigningConfig> {
        Ok(PresigningConfig::expires_in(Duration::from_secs(
            expires_in_secs,
        ))?)
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, key: &str) -> String {
        let encoded = utf8_percent_encode(key, KEY_ENCODE);
        match &self.endpoint {
            // Path-style for custom endpoints (MinIO, R2)
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, encoded),
            // Virtual-hosted style for AWS proper
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, encoded
            ),
        }
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in_secs: u64,
    ) -> Result<String> {
        let req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(self.presigning(expires_in_secs)?)
            .await?;
        Ok(req.uri().to_string())
    }

    async fn presign_get(
        &self,
        key: &str,
        expires_in_secs: u64,
        content_type: &str,
        content_disposition: &str,
    ) -> Result<String> {
        let req = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_type(content_type)
            .response_content_disposition(content_disposition)
            .presigned(self.presigning(expires_in_secs)?)
            .await?;
        Ok(req.uri().to_string())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<Option<String>> {
        let mut builder = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key);
        if let Some(ct) = content_type {
            builder = builder.content_type(ct);
        }
        let res = builder.send().await?;
        Ok(res.upload_id().map(|id| id.to_string()))
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in_secs: u64,
    ) -> Result<String> {
        let req = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(self.presigning(expires_in_secs)?)
            .await?;
        Ok(req.uri().to_string())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<(i32, String)>,
    ) -> Result<()> {
        let completed_parts: Vec<CompletedPart> = parts
            .into_iter()
            .map(|(part_number, e_tag)| {
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(e_tag)
                    .build()
            })
            .collect();

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await?;
        Ok(())
    }
}
