use super::{
    CompletedPart, DirectGrant, FileSource, MAX_PART_COUNT, PART_SIZE, PartTransport, Progress,
    ProgressSink, SINGLE_SHOT_CEILING, SessionGrant, UploadApi, UploadError, UploadRequest,
    Uploaded, needs_chunked_path, part_count, part_extent,
};
use crate::services::coordinator::DirectUploadAuth;
use std::sync::Arc;
use tracing::warn;

/// Transfer thresholds. The defaults mirror the storage backend's hard
/// limits; tests shrink them to keep fixtures small.
#[derive(Debug, Clone, Copy)]
pub struct UploaderOptions {
    pub single_shot_ceiling: u64,
    pub part_size: u64,
}

impl Default for UploaderOptions {
    fn default() -> Self {
        Self {
            single_shot_ceiling: SINGLE_SHOT_CEILING,
            part_size: PART_SIZE,
        }
    }
}

/// Drives one file into object storage through the admin upload API.
///
/// Parts are uploaded strictly sequentially within a session; the completed
/// list is nonetheless sorted before finalization, which is what the storage
/// backend actually requires.
pub struct Uploader {
    api: Arc<dyn UploadApi>,
    transport: Arc<dyn PartTransport>,
    options: UploaderOptions,
}

impl Uploader {
    pub fn new(api: Arc<dyn UploadApi>, transport: Arc<dyn PartTransport>) -> Self {
        Self::with_options(api, transport, UploaderOptions::default())
    }

    pub fn with_options(
        api: Arc<dyn UploadApi>,
        transport: Arc<dyn PartTransport>,
        options: UploaderOptions,
    ) -> Self {
        Self {
            api,
            transport,
            options,
        }
    }

    pub async fn upload(
        &self,
        source: &dyn FileSource,
        request: &UploadRequest,
        mut progress: Option<ProgressSink>,
    ) -> Result<Uploaded, UploadError> {
        let total = source.len();
        if needs_chunked_path(total, self.options.single_shot_ceiling) {
            self.upload_chunked(source, request, total, progress.as_mut())
                .await
        } else {
            self.upload_direct(source, request, total, progress.as_mut())
                .await
        }
    }

    /// Single transfer of the whole body. No session is opened, so there is
    /// nothing to clean up on failure.
    async fn upload_direct(
        &self,
        source: &dyn FileSource,
        request: &UploadRequest,
        total: u64,
        progress: Option<&mut ProgressSink>,
    ) -> Result<Uploaded, UploadError> {
        let grant: DirectGrant = self
            .api
            .begin_direct_upload(request)
            .await
            .map_err(UploadError::DirectUploadFailed)?;

        let body = source.read_range(0, total).await?;

        match &grant.authorization {
            DirectUploadAuth::Put { url } => {
                self.transport
                    .put(url, Some(&request.content_type), body)
                    .await
                    .map_err(UploadError::DirectUploadFailed)?;
            }
            DirectUploadAuth::Post { url, fields } => {
                self.transport
                    .post_form(url, fields, &request.file_name, &request.content_type, body)
                    .await
                    .map_err(UploadError::DirectUploadFailed)?;
            }
        }

        if let Some(report) = progress {
            report(Progress {
                bytes_transferred: total,
                total_bytes: total,
                part_number: 1,
                part_bytes_transferred: total,
                part_bytes_total: total,
            });
        }

        Ok(Uploaded {
            file_url: grant.file_url,
            key: grant.key,
        })
    }

    async fn upload_chunked(
        &self,
        source: &dyn FileSource,
        request: &UploadRequest,
        total: u64,
        progress: Option<&mut ProgressSink>,
    ) -> Result<Uploaded, UploadError> {
        // The part cap is checked before opening a session so an impossible
        // transfer never leaves backend state behind.
        let count = part_count(total, self.options.part_size);
        if count > MAX_PART_COUNT {
            return Err(UploadError::FileTooLarge);
        }

        let grant: SessionGrant = self
            .api
            .init_session(request)
            .await
            .map_err(UploadError::SessionInitFailed)?;

        match self.transfer_parts(source, &grant, total, count, progress).await {
            Ok(file_url) => Ok(Uploaded {
                file_url,
                key: grant.key,
            }),
            Err(err) => {
                // Best-effort cleanup. A failed abort is logged and the
                // original failure stays the one the caller sees.
                if let Err(abort_err) = self.api.abort_session(&grant.upload_id, &grant.key).await
                {
                    warn!(
                        upload_id = %grant.upload_id,
                        key = %grant.key,
                        error = %abort_err,
                        "aborting upload session failed; propagating the original upload error"
                    );
                }
                Err(err)
            }
        }
    }

    async fn transfer_parts(
        &self,
        source: &dyn FileSource,
        grant: &SessionGrant,
        total: u64,
        count: u64,
        mut progress: Option<&mut ProgressSink>,
    ) -> Result<String, UploadError> {
        let mut parts: Vec<CompletedPart> = Vec::with_capacity(count as usize);
        let mut transferred = 0u64;

        for number in 1..=count {
            let part_number = number as i32;
            let (offset, len) = part_extent(total, self.options.part_size, number);

            let url = self
                .api
                .presign_part(&grant.upload_id, &grant.key, part_number)
                .await
                .map_err(|source| UploadError::PartUploadFailed {
                    part: part_number,
                    source,
                })?;

            let chunk = source.read_range(offset, len).await?;

            let etag = self
                .transport
                .put(&url, None, chunk)
                .await
                .map_err(|source| UploadError::PartUploadFailed {
                    part: part_number,
                    source,
                })?
                .filter(|tag| !tag.trim().is_empty())
                .ok_or(UploadError::MissingIntegrityTag(part_number))?;

            parts.push(CompletedPart { part_number, etag });
            transferred += len;

            if let Some(report) = progress.as_deref_mut() {
                report(Progress {
                    bytes_transferred: transferred,
                    total_bytes: total,
                    part_number,
                    part_bytes_transferred: len,
                    part_bytes_total: len,
                });
            }
        }

        // The backend rejects completion lists that are not strictly
        // ascending.
        parts.sort_by_key(|p| p.part_number);

        self.api
            .complete_session(&grant.upload_id, &grant.key, &parts)
            .await
            .map_err(UploadError::SessionFinalizeFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source of `len` zero bytes; never allocates more than one range.
    struct ZeroSource {
        len: u64,
    }

    #[async_trait]
    impl FileSource for ZeroSource {
        fn len(&self) -> u64 {
            self.len
        }

        async fn read_range(&self, offset: u64, len: u64) -> std::io::Result<Bytes> {
            assert!(offset + len <= self.len, "read past end of source");
            Ok(Bytes::from(vec![0u8; len as usize]))
        }
    }

    #[derive(Default)]
    struct MockApi {
        direct_auth_fields: Option<HashMap<String, String>>,
        begin_calls: AtomicUsize,
        init_calls: AtomicUsize,
        presigned: Mutex<Vec<i32>>,
        completed: Mutex<Option<Vec<CompletedPart>>>,
        aborted: Mutex<Vec<(String, String)>>,
        fail_presign_for: Option<i32>,
        fail_abort: bool,
    }

    #[async_trait]
    impl UploadApi for MockApi {
        async fn begin_direct_upload(
            &self,
            _request: &UploadRequest,
        ) -> anyhow::Result<DirectGrant> {
            self.begin_calls.fetch_add(1, Ordering::SeqCst);
            let authorization = match &self.direct_auth_fields {
                Some(fields) => DirectUploadAuth::Post {
                    url: "mock://direct".to_string(),
                    fields: fields.clone(),
                },
                None => DirectUploadAuth::Put {
                    url: "mock://direct".to_string(),
                },
            };
            Ok(DirectGrant {
                authorization,
                key: "uploads/1_clip.mp4".to_string(),
                file_url: "https://cdn/uploads/1_clip.mp4".to_string(),
            })
        }

        async fn init_session(&self, _request: &UploadRequest) -> anyhow::Result<SessionGrant> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SessionGrant {
                upload_id: "upload-1".to_string(),
                key: "uploads/1_clip.mp4".to_string(),
                file_url: "https://cdn/uploads/1_clip.mp4".to_string(),
            })
        }

        async fn presign_part(
            &self,
            upload_id: &str,
            key: &str,
            part_number: i32,
        ) -> anyhow::Result<String> {
            assert_eq!(upload_id, "upload-1");
            assert_eq!(key, "uploads/1_clip.mp4");
            if self.fail_presign_for == Some(part_number) {
                return Err(anyhow!("presign refused"));
            }
            self.presigned.lock().unwrap().push(part_number);
            Ok(format!("mock://part/{part_number}"))
        }

        async fn complete_session(
            &self,
            _upload_id: &str,
            _key: &str,
            parts: &[CompletedPart],
        ) -> anyhow::Result<String> {
            *self.completed.lock().unwrap() = Some(parts.to_vec());
            Ok("https://cdn/uploads/1_clip.mp4".to_string())
        }

        async fn abort_session(&self, upload_id: &str, key: &str) -> anyhow::Result<()> {
            self.aborted
                .lock()
                .unwrap()
                .push((upload_id.to_string(), key.to_string()));
            if self.fail_abort {
                return Err(anyhow!("abort refused"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockTransport {
        puts: Mutex<Vec<(String, u64)>>,
        posted_fields: Mutex<Option<HashMap<String, String>>>,
        fail_put_to: Option<String>,
        omit_etag_for: Option<String>,
    }

    #[async_trait]
    impl PartTransport for MockTransport {
        async fn put(
            &self,
            url: &str,
            _content_type: Option<&str>,
            body: Bytes,
        ) -> anyhow::Result<Option<String>> {
            if self.fail_put_to.as_deref() == Some(url) {
                return Err(anyhow!("storage returned 403"));
            }
            self.puts
                .lock()
                .unwrap()
                .push((url.to_string(), body.len() as u64));
            if self.omit_etag_for.as_deref() == Some(url) {
                return Ok(None);
            }
            Ok(Some(format!("\"etag-{}\"", url.rsplit('/').next().unwrap())))
        }

        async fn post_form(
            &self,
            url: &str,
            fields: &HashMap<String, String>,
            _file_name: &str,
            _content_type: &str,
            body: Bytes,
        ) -> anyhow::Result<()> {
            self.puts
                .lock()
                .unwrap()
                .push((url.to_string(), body.len() as u64));
            *self.posted_fields.lock().unwrap() = Some(fields.clone());
            Ok(())
        }
    }

    fn request() -> UploadRequest {
        UploadRequest {
            file_name: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            folder: None,
        }
    }

    fn small_options() -> UploaderOptions {
        UploaderOptions {
            single_shot_ceiling: 1024,
            part_size: 256,
        }
    }

    fn uploader(api: Arc<MockApi>, transport: Arc<MockTransport>) -> Uploader {
        Uploader::with_options(api, transport, small_options())
    }

    #[tokio::test]
    async fn test_small_file_takes_direct_path_only() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let up = uploader(api.clone(), transport.clone());

        let progress: Arc<Mutex<Vec<Progress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        let result = up
            .upload(
                &ZeroSource { len: 100 },
                &request(),
                Some(Box::new(move |p| sink.lock().unwrap().push(p))),
            )
            .await
            .unwrap();

        assert_eq!(result.key, "uploads/1_clip.mp4");
        assert_eq!(api.begin_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 0);
        assert!(api.presigned.lock().unwrap().is_empty());
        assert!(api.completed.lock().unwrap().is_none());
        assert!(api.aborted.lock().unwrap().is_empty());

        let progress = progress.lock().unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].bytes_transferred, 100);
        assert_eq!(progress[0].total_bytes, 100);
    }

    #[tokio::test]
    async fn test_exactly_at_ceiling_stays_direct() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let up = uploader(api.clone(), transport.clone());

        up.upload(&ZeroSource { len: 1024 }, &request(), None)
            .await
            .unwrap();

        assert_eq!(api.begin_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_direct_post_shape_sends_fields() {
        let mut fields = HashMap::new();
        fields.insert("policy".to_string(), "signed".to_string());
        let api = Arc::new(MockApi {
            direct_auth_fields: Some(fields.clone()),
            ..MockApi::default()
        });
        let transport = Arc::new(MockTransport::default());
        let up = uploader(api.clone(), transport.clone());

        up.upload(&ZeroSource { len: 10 }, &request(), None)
            .await
            .unwrap();

        assert_eq!(*transport.posted_fields.lock().unwrap(), Some(fields));
    }

    #[tokio::test]
    async fn test_chunked_path_covers_every_part_in_order() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let up = uploader(api.clone(), transport.clone());

        // 1000 bytes at 256/part: 3 full parts and a 232-byte tail
        let progress: Arc<Mutex<Vec<Progress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        up.upload(
            &ZeroSource { len: 1000 },
            &request(),
            Some(Box::new(move |p| sink.lock().unwrap().push(p))),
        )
        .await
        .unwrap();

        assert_eq!(api.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*api.presigned.lock().unwrap(), vec![1, 2, 3, 4]);

        let completed = api.completed.lock().unwrap().clone().unwrap();
        assert_eq!(
            completed.iter().map(|p| p.part_number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(completed.iter().all(|p| !p.etag.is_empty()));

        let sizes: Vec<u64> = transport.puts.lock().unwrap().iter().map(|(_, n)| *n).collect();
        assert_eq!(sizes, vec![256, 256, 256, 232]);

        let progress = progress.lock().unwrap();
        let cumulative: Vec<u64> = progress.iter().map(|p| p.bytes_transferred).collect();
        assert_eq!(cumulative, vec![256, 512, 768, 1000]);
        assert_eq!(progress.last().unwrap().part_bytes_total, 232);

        assert!(api.aborted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_part_aborts_once_and_reraises() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport {
            fail_put_to: Some("mock://part/3".to_string()),
            ..MockTransport::default()
        });
        let up = uploader(api.clone(), transport.clone());

        // 5 parts; part 3 of 5 fails
        let err = up
            .upload(&ZeroSource { len: 256 * 4 + 200 }, &request(), None)
            .await
            .unwrap_err();

        match err {
            UploadError::PartUploadFailed { part, .. } => assert_eq!(part, 3),
            other => panic!("unexpected error: {other:?}"),
        }

        let aborted = api.aborted.lock().unwrap();
        assert_eq!(
            *aborted,
            vec![("upload-1".to_string(), "uploads/1_clip.mp4".to_string())]
        );
        assert!(api.completed.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abort_failure_never_masks_the_original_error() {
        let api = Arc::new(MockApi {
            fail_abort: true,
            ..MockApi::default()
        });
        let transport = Arc::new(MockTransport {
            fail_put_to: Some("mock://part/2".to_string()),
            ..MockTransport::default()
        });
        let up = uploader(api.clone(), transport.clone());

        let err = up
            .upload(&ZeroSource { len: 256 * 3 }, &request(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::PartUploadFailed { part: 2, .. }));
        assert_eq!(api.aborted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_integrity_tag_fails_the_part() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport {
            omit_etag_for: Some("mock://part/2".to_string()),
            ..MockTransport::default()
        });
        let up = uploader(api.clone(), transport.clone());

        let err = up
            .upload(&ZeroSource { len: 256 * 3 }, &request(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::MissingIntegrityTag(2)));
        assert_eq!(api.aborted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_presign_failure_tears_down_the_session() {
        let api = Arc::new(MockApi {
            fail_presign_for: Some(2),
            ..MockApi::default()
        });
        let transport = Arc::new(MockTransport::default());
        let up = uploader(api.clone(), transport.clone());

        let err = up
            .upload(&ZeroSource { len: 256 * 3 }, &request(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::PartUploadFailed { part: 2, .. }));
        assert_eq!(api.aborted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_part_cap_refuses_before_opening_a_session() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let up = Uploader::with_options(
            api.clone(),
            transport,
            UploaderOptions {
                single_shot_ceiling: 1,
                part_size: 1,
            },
        );

        let err = up
            .upload(&ZeroSource { len: MAX_PART_COUNT + 1 }, &request(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::FileTooLarge));
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 0);
        assert!(api.aborted.lock().unwrap().is_empty());
    }
}
