use crate::services::storage::ObjectStorage;
use crate::utils::validation::{normalize_folder, sanitize_file_name};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

/// Storage-backend hard bounds for one multipart session.
pub const MIN_PART_NUMBER: i64 = 1;
pub const MAX_PART_NUMBER: i64 = 10_000;

const DEFAULT_FOLDER: &str = "uploads";

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("partNumber must be between {MIN_PART_NUMBER} and {MAX_PART_NUMBER}, got {0}")]
    InvalidPartNumber(i64),

    #[error("parts must contain at least one entry with an integer PartNumber and an ETag")]
    NoValidParts,

    #[error("storage credentials unavailable")]
    CredentialsUnavailable(#[source] anyhow::Error),

    #[error("could not open upload session")]
    SessionInitFailed(#[source] anyhow::Error),

    #[error("could not finalize upload session")]
    SessionFinalizeFailed(#[source] anyhow::Error),

    #[error("could not abort upload session")]
    SessionAbortFailed(#[source] anyhow::Error),
}

/// The direct path authorization comes in two shapes depending on server
/// configuration: a bare signed PUT, or a signed POST with accompanying form
/// fields. Clients must handle both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectUploadAuth {
    // Post carries strictly more fields, so it must be matched first
    Post {
        #[serde(rename = "uploadUrl")]
        url: String,
        fields: HashMap<String, String>,
    },
    Put {
        #[serde(rename = "uploadUrl")]
        url: String,
    },
}

#[derive(Debug, Clone)]
pub struct DirectUploadGrant {
    pub authorization: DirectUploadAuth,
    pub key: String,
    pub bucket: String,
    pub file_url: String,
}

#[derive(Debug, Clone)]
pub struct MultipartGrant {
    pub upload_id: String,
    pub key: String,
    pub bucket: String,
    pub file_url: String,
}

/// One entry of the completion request as it arrives on the wire. Part
/// numbers are accepted in whatever JSON shape the client sent and coerced
/// during normalization; integrity tags are echoed back to the backend
/// verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RawPart {
    #[serde(rename = "PartNumber")]
    #[schema(value_type = i64)]
    pub part_number: Value,
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
}

/// Issues narrowly-scoped, time-limited storage authorizations for every
/// step of the upload protocol. Holds no per-session state: the storage
/// backend is the source of truth for open sessions and is trusted to
/// reject invalid transitions.
pub struct UploadCoordinator {
    storage: Arc<dyn ObjectStorage>,
    presign_ttl_secs: u64,
}

impl UploadCoordinator {
    pub fn new(storage: Arc<dyn ObjectStorage>, presign_ttl_secs: u64) -> Self {
        Self {
            storage,
            presign_ttl_secs,
        }
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    fn object_key(&self, folder: Option<&str>, file_name: &str) -> String {
        build_object_key(folder, file_name, chrono::Utc::now().timestamp_millis())
    }

    /// Authorize a single-shot upload of the full file body.
    pub async fn begin_direct_upload(
        &self,
        file_name: &str,
        content_type: &str,
        folder: Option<&str>,
    ) -> Result<DirectUploadGrant, CoordinatorError> {
        let key = self.object_key(folder, file_name);

        let url = self
            .storage
            .presign_put(&key, content_type, self.presign_ttl_secs)
            .await
            .map_err(CoordinatorError::CredentialsUnavailable)?;

        tracing::info!(bucket = %self.storage.bucket(), %key, "issued direct upload authorization");

        Ok(DirectUploadGrant {
            authorization: DirectUploadAuth::Put { url },
            bucket: self.storage.bucket().to_string(),
            file_url: self.storage.public_url(&key),
            key,
        })
    }

    /// Open a multipart session for a file too large for one-shot upload.
    pub async fn init_session(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        folder: Option<&str>,
    ) -> Result<MultipartGrant, CoordinatorError> {
        let key = self.object_key(folder, file_name);

        let upload_id = self
            .storage
            .create_multipart_upload(&key, content_type)
            .await
            .map_err(CoordinatorError::SessionInitFailed)?
            .ok_or_else(|| {
                CoordinatorError::SessionInitFailed(anyhow::anyhow!(
                    "storage backend returned no upload id"
                ))
            })?;

        tracing::info!(bucket = %self.storage.bucket(), %key, %upload_id, "opened multipart session");

        Ok(MultipartGrant {
            upload_id,
            bucket: self.storage.bucket().to_string(),
            file_url: self.storage.public_url(&key),
            key,
        })
    }

    /// Authorize the upload of one exact part. The bound check runs before
    /// any storage call.
    pub async fn presign_part(
        &self,
        upload_id: &str,
        key: &str,
        part_number: i64,
    ) -> Result<String, CoordinatorError> {
        if !(MIN_PART_NUMBER..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(CoordinatorError::InvalidPartNumber(part_number));
        }

        self.storage
            .presign_upload_part(key, upload_id, part_number as i32, self.presign_ttl_secs)
            .await
            .map_err(CoordinatorError::CredentialsUnavailable)
    }

    /// Finalize a session. Normalization happens entirely here; the backend
    /// only ever sees a sorted, deduplicated, tag-complete list.
    pub async fn complete_session(
        &self,
        upload_id: &str,
        key: &str,
        parts: Vec<RawPart>,
    ) -> Result<String, CoordinatorError> {
        let normalized = normalize_parts(&parts);
        if normalized.is_empty() {
            return Err(CoordinatorError::NoValidParts);
        }

        self.storage
            .complete_multipart_upload(key, upload_id, normalized)
            .await
            .map_err(CoordinatorError::SessionFinalizeFailed)?;

        tracing::info!(%key, %upload_id, "multipart session completed");

        Ok(self.storage.public_url(key))
    }

    /// Release a failed session. Best-effort: callers treat failure as
    /// non-fatal and only log it.
    pub async fn abort_session(&self, upload_id: &str, key: &str) -> Result<(), CoordinatorError> {
        self.storage
            .abort_multipart_upload(key, upload_id)
            .await
            .map_err(CoordinatorError::SessionAbortFailed)?;

        tracing::info!(%key, %upload_id, "multipart session aborted");
        Ok(())
    }
}

/// `<folder-or-default>/<timestamp>_<sanitized file name>`
fn build_object_key(folder: Option<&str>, file_name: &str, timestamp_millis: i64) -> String {
    let prefix = normalize_folder(folder).unwrap_or_else(|| DEFAULT_FOLDER.to_string());
    format!(
        "{}/{}_{}",
        prefix,
        timestamp_millis,
        sanitize_file_name(file_name)
    )
}

/// Coerce part numbers to integers, drop entries missing an integrity tag,
/// carrying a non-integer or out-of-range part number, or repeating an
/// already-seen part number; sort ascending.
fn normalize_parts(parts: &[RawPart]) -> Vec<(i32, String)> {
    let mut seen = HashSet::new();
    let mut out: Vec<(i32, String)> = parts
        .iter()
        .filter_map(|p| {
            let n = coerce_part_number(&p.part_number)?;
            if !(MIN_PART_NUMBER..=MAX_PART_NUMBER).contains(&n) {
                return None;
            }
            let etag = p.etag.as_deref()?.trim();
            if etag.is_empty() || !seen.insert(n) {
                return None;
            }
            Some((n as i32, etag.to_string()))
        })
        .collect();
    out.sort_by_key(|(n, _)| *n);
    out
}

fn coerce_part_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(part_number: Value, etag: Option<&str>) -> RawPart {
        RawPart {
            part_number,
            etag: etag.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_object_key_shape() {
        let key = build_object_key(Some("courses/offense"), "my drill.mp4", 1700000000000);
        assert_eq!(key, "courses/offense/1700000000000_my_drill.mp4");
    }

    #[test]
    fn test_object_key_default_folder() {
        let key = build_object_key(None, "clip.mp4", 42);
        assert_eq!(key, "uploads/42_clip.mp4");
        let key = build_object_key(Some("  "), "clip.mp4", 42);
        assert_eq!(key, "uploads/42_clip.mp4");
    }

    #[test]
    fn test_object_key_strips_trailing_slashes_and_paths() {
        let key = build_object_key(Some("previews///"), "../../trailer v2.mov", 7);
        assert_eq!(key, "previews/7_trailer_v2.mov");
    }

    #[test]
    fn test_normalize_sorts_ascending() {
        let parts = vec![
            raw(json!(3), Some("\"c\"")),
            raw(json!(1), Some("\"a\"")),
            raw(json!(2), Some("\"b\"")),
        ];
        assert_eq!(
            normalize_parts(&parts),
            vec![
                (1, "\"a\"".to_string()),
                (2, "\"b\"".to_string()),
                (3, "\"c\"".to_string())
            ]
        );
    }

    #[test]
    fn test_normalize_coerces_strings_and_whole_floats() {
        let parts = vec![
            raw(json!("2"), Some("b")),
            raw(json!(1.0), Some("a")),
        ];
        assert_eq!(
            normalize_parts(&parts),
            vec![(1, "a".to_string()), (2, "b".to_string())]
        );
    }

    #[test]
    fn test_normalize_drops_invalid_entries() {
        let parts = vec![
            raw(json!(1), Some("a")),
            raw(json!(2.5), Some("fractional")),
            raw(json!("x"), Some("non-numeric")),
            raw(json!(3), None),
            raw(json!(3), Some("   ")),
            raw(json!(1), Some("duplicate")),
            raw(json!(0), Some("below-range")),
            raw(json!(10_001), Some("above-range")),
            raw(json!(4), Some("d")),
        ];
        assert_eq!(
            normalize_parts(&parts),
            vec![(1, "a".to_string()), (4, "d".to_string())]
        );
    }

    #[test]
    fn test_normalize_all_invalid_is_empty() {
        let parts = vec![raw(json!(2.5), Some("a")), raw(json!(1), None)];
        assert!(normalize_parts(&parts).is_empty());
    }
}
