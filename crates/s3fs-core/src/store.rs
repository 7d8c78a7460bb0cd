//! The object store collaborator.
//!
//! [`ObjectStore`] is the full surface this crate consumes from a backing
//! store. One instance is bound to one bucket and is shared, immutable, by
//! every handle, tree operation and upload session as an
//! `Arc<dyn ObjectStore>`.
//!
//! Implementations:
//!
//! - [`InMemoryStore`](crate::memory::InMemoryStore) -- sorted in-memory map,
//!   used by tests and for embedding.
//! - `S3Store` in the `s3fs-aws` crate -- any S3-compatible service.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::StoreResult;
use crate::path;

/// Streaming body of a fetched object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata of one stored object, as reported by `head` or `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// The object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// When the object was last written.
    pub last_modified: DateTime<Utc>,
    /// Entity tag, if the store reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page, in key order.
    pub objects: Vec<ObjectMeta>,
    /// Whether more objects follow.
    pub is_truncated: bool,
    /// Token to pass to the next `list` call when truncated.
    pub next_continuation_token: Option<String>,
}

/// A part accepted by the store, as submitted in a completion manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    /// The part number (1-based).
    pub part_number: u32,
    /// The entity tag the store issued for the part.
    pub etag: String,
}

/// Object store operations consumed by the filesystem layer.
///
/// All methods are single round trips; none retries. Keys are passed
/// exactly as stored (no leading separator).
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Open a streaming read of the whole object.
    async fn get(&self, key: &str) -> StoreResult<ObjectReader>;

    /// Open a streaming read from `offset` to the end of the object.
    ///
    /// An `offset` at or past the end of the object fails with
    /// [`StoreError::InvalidRange`](crate::StoreError::InvalidRange).
    async fn get_from(&self, key: &str, offset: u64) -> StoreResult<ObjectReader>;

    /// Fetch the half-open byte range `[start, end)`.
    ///
    /// `end` is clamped to the object size. A `start` at or past the end of
    /// the object fails with [`StoreError::InvalidRange`](crate::StoreError::InvalidRange).
    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes>;

    /// Store a whole object, replacing any previous one.
    async fn put(&self, key: &str, body: Bytes) -> StoreResult<()>;

    /// Delete an object. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Fetch object metadata.
    async fn head(&self, key: &str) -> StoreResult<ObjectMeta>;

    /// List objects whose key starts with `prefix`, in key order.
    ///
    /// `max_keys` caps the page size; the store may return fewer.
    async fn list(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: Option<usize>,
    ) -> StoreResult<ListPage>;

    /// Copy an object to a new key within the same bucket.
    async fn copy(&self, src_key: &str, dst_key: &str) -> StoreResult<()>;

    /// Begin a multipart upload and return its upload ID.
    async fn start_multipart(&self, key: &str) -> StoreResult<String>;

    /// Upload one part and return its entity tag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> StoreResult<String>;

    /// Assemble the listed parts into the final object.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()>;

    /// Discard an upload and all of its parts.
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StoreResult<()>;
}

/// Caller-facing description of a file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Display name. The last path segment for `stat`, the full key for
    /// directory listings.
    pub name: String,
    /// The object key.
    pub key: String,
    /// Size in bytes (zero for directory markers).
    pub size: u64,
    /// When the object was last written.
    pub last_modified: DateTime<Utc>,
    /// Whether the key is directory-like.
    pub is_dir: bool,
}

impl FileInfo {
    /// Build a stat record named after the last path segment.
    #[must_use]
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self {
            name: path::base_name(&meta.key).to_owned(),
            key: meta.key.clone(),
            size: meta.size,
            last_modified: meta.last_modified,
            is_dir: path::is_dir_key(&meta.key),
        }
    }

    /// Build a listing entry named by its full key.
    #[must_use]
    pub fn listing_entry(meta: &ObjectMeta) -> Self {
        Self {
            name: meta.key.clone(),
            ..Self::from_meta(meta)
        }
    }
}
