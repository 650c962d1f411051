//! Client-side upload orchestration.
//!
//! Moves one local file into object storage through the admin upload API,
//! choosing the cheapest correct protocol path: a single presigned transfer
//! for anything the backend accepts in one shot, or a chunked multipart
//! session above that ceiling. On any mid-session failure the session is
//! aborted so no orphaned server-side state survives.

pub mod http;
pub mod orchestrator;

pub use orchestrator::{Uploader, UploaderOptions};

use crate::services::coordinator::DirectUploadAuth;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Largest object the storage backend accepts as a single PUT: 5 GiB.
pub const SINGLE_SHOT_CEILING: u64 = 5 * 1024 * 1024 * 1024;

/// Fixed chunk size for the multipart path: 100 MiB per part.
pub const PART_SIZE: u64 = 100 * 1024 * 1024;

/// The storage backend caps sessions at this many parts.
pub const MAX_PART_COUNT: u64 = 10_000;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file exceeds the storage backend's limits")]
    FileTooLarge,

    #[error("reading the source file failed")]
    Source(#[from] std::io::Error),

    #[error("direct upload failed")]
    DirectUploadFailed(#[source] anyhow::Error),

    #[error("could not open upload session")]
    SessionInitFailed(#[source] anyhow::Error),

    #[error("uploading part {part} failed")]
    PartUploadFailed {
        part: i32,
        #[source]
        source: anyhow::Error,
    },

    #[error("no integrity tag returned for part {0}")]
    MissingIntegrityTag(i32),

    #[error("could not finalize upload session")]
    SessionFinalizeFailed(#[source] anyhow::Error),

    /// Secondary failure only: logged as a warning, never propagated over
    /// the error that triggered the abort.
    #[error("could not abort upload session")]
    SessionAbortFailed(#[source] anyhow::Error),
}

/// Anything with a known total size and random-access range reads.
#[async_trait]
pub trait FileSource: Send + Sync {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn read_range(&self, offset: u64, len: u64) -> std::io::Result<Bytes>;
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub folder: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Uploaded {
    pub file_url: String,
    pub key: String,
}

/// One finalized part as echoed back at completion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: i32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Debug, Clone)]
pub struct DirectGrant {
    pub authorization: DirectUploadAuth,
    pub key: String,
    pub file_url: String,
}

#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub upload_id: String,
    pub key: String,
    pub file_url: String,
}

/// Progress snapshot delivered after every completed transfer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub part_number: i32,
    pub part_bytes_transferred: u64,
    pub part_bytes_total: u64,
}

pub type ProgressSink = Box<dyn FnMut(Progress) + Send>;

/// The coordinator's REST surface as seen from the client.
#[async_trait]
pub trait UploadApi: Send + Sync {
    async fn begin_direct_upload(&self, request: &UploadRequest) -> anyhow::Result<DirectGrant>;

    async fn init_session(&self, request: &UploadRequest) -> anyhow::Result<SessionGrant>;

    async fn presign_part(
        &self,
        upload_id: &str,
        key: &str,
        part_number: i32,
    ) -> anyhow::Result<String>;

    /// Returns the public URL of the assembled object.
    async fn complete_session(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> anyhow::Result<String>;

    async fn abort_session(&self, upload_id: &str, key: &str) -> anyhow::Result<()>;
}

/// Raw byte transfer to presigned destinations.
#[async_trait]
pub trait PartTransport: Send + Sync {
    /// PUT a body to a presigned URL; yields the integrity tag header when
    /// the backend returned one.
    async fn put(
        &self,
        url: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> anyhow::Result<Option<String>>;

    /// POST a body with accompanying form fields (the alternative direct
    /// path shape).
    async fn post_form(
        &self,
        url: &str,
        fields: &HashMap<String, String>,
        file_name: &str,
        content_type: &str,
        body: Bytes,
    ) -> anyhow::Result<()>;
}

/// Chunked only above the ceiling; the boundary itself still goes direct.
pub(crate) fn needs_chunked_path(size: u64, ceiling: u64) -> bool {
    size > ceiling
}

pub(crate) fn part_count(size: u64, part_size: u64) -> u64 {
    size.div_ceil(part_size)
}

/// (offset, length) of one 1-based part.
pub(crate) fn part_extent(size: u64, part_size: u64, part_number: u64) -> (u64, u64) {
    let offset = (part_number - 1) * part_size;
    let len = part_size.min(size - offset);
    (offset, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_decision_at_the_ceiling() {
        assert!(!needs_chunked_path(SINGLE_SHOT_CEILING - 1, SINGLE_SHOT_CEILING));
        assert!(!needs_chunked_path(SINGLE_SHOT_CEILING, SINGLE_SHOT_CEILING));
        assert!(needs_chunked_path(SINGLE_SHOT_CEILING + 1, SINGLE_SHOT_CEILING));
    }

    #[test]
    fn test_part_count_for_twelve_gib() {
        let twelve_gib = 12 * 1024 * 1024 * 1024u64;
        assert_eq!(part_count(twelve_gib, PART_SIZE), 123);

        // 122 full parts plus one partial remainder
        let (offset, len) = part_extent(twelve_gib, PART_SIZE, 123);
        assert_eq!(offset, 122 * PART_SIZE);
        assert_eq!(len, twelve_gib - 122 * PART_SIZE);
        assert!(len < PART_SIZE);
    }

    #[test]
    fn test_part_extents_cover_exactly_once() {
        let size = 10 * PART_SIZE + 1;
        let count = part_count(size, PART_SIZE);
        assert_eq!(count, 11);

        let mut expected_offset = 0u64;
        for number in 1..=count {
            let (offset, len) = part_extent(size, PART_SIZE, number);
            assert_eq!(offset, expected_offset);
            assert!(len > 0);
            expected_offset += len;
        }
        assert_eq!(expected_offset, size);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail_part() {
        let size = 4 * PART_SIZE;
        assert_eq!(part_count(size, PART_SIZE), 4);
        let (_, len) = part_extent(size, PART_SIZE, 4);
        assert_eq!(len, PART_SIZE);
    }
}
