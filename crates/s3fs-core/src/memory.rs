//! In-memory [`ObjectStore`] implementation.
//!
//! Objects live in a `BTreeMap` so keys are always sorted, which is what
//! prefix listings with continuation tokens rely on. In-progress multipart
//! uploads are tracked in a [`DashMap`] keyed by upload ID, each holding its
//! parts keyed by part number.
//!
//! The store mirrors S3 behavior where the filesystem layer depends on it:
//! deleting a missing key succeeds, range ends are clamped, completion
//! manifests must be strictly ascending and match the issued part ETags.
//! It does not enforce the 5 MiB minimum size for non-final parts.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::checksums::{self, MultipartEtag};
use crate::error::{StoreError, StoreResult};
use crate::store::{CompletedPart, ListPage, ObjectMeta, ObjectReader, ObjectStore};

/// Default maximum number of keys returned in a single listing page.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Highest part number S3 accepts.
const MAX_PART_NUMBER: u32 = 10_000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_owned(),
            size: self.data.len() as u64,
            last_modified: self.last_modified,
            etag: Some(self.etag.clone()),
        }
    }
}

#[derive(Debug)]
struct StoredPart {
    data: Bytes,
    etag: String,
}

#[derive(Debug)]
struct PendingUpload {
    key: String,
    initiated: DateTime<Utc>,
    parts: BTreeMap<u32, StoredPart>,
}

/// Thread-safe in-memory object store for a single bucket.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use s3fs_core::{InMemoryStore, ObjectStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryStore::new().with_page_size(2);
/// for key in ["a/1", "a/2", "a/3"] {
///     store.put(key, Bytes::from_static(b"x")).await.unwrap();
/// }
///
/// let page = store.list("a/", None, None).await.unwrap();
/// assert_eq!(page.objects.len(), 2);
/// assert!(page.is_truncated);
///
/// let token = page.next_continuation_token.as_deref();
/// let page = store.list("a/", token, None).await.unwrap();
/// assert_eq!(page.objects.len(), 1);
/// assert!(!page.is_truncated);
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    uploads: DashMap<String, PendingUpload>,
    page_size: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store with the default page size (1000 keys).
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            uploads: DashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the maximum number of keys per listing page (at least 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Maximum number of keys per listing page.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// All stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// The body of an object, if present.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    /// Number of multipart uploads that are neither completed nor aborted.
    #[must_use]
    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    /// Remove every object and pending upload.
    pub fn reset(&self) {
        debug!("resetting in-memory store");
        self.objects.write().clear();
        self.uploads.clear();
    }

    fn insert(&self, key: &str, data: Bytes, etag: String) {
        let size = data.len();
        self.objects.write().insert(
            key.to_owned(),
            StoredObject {
                data,
                etag,
                last_modified: Utc::now(),
            },
        );
        trace!(key, size, "stored object");
    }

    fn lookup(&self, key: &str) -> StoreResult<StoredObject> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_owned(),
            })
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<ObjectReader> {
        let object = self.lookup(key)?;
        let reader: ObjectReader = Box::pin(std::io::Cursor::new(object.data));
        Ok(reader)
    }

    async fn get_from(&self, key: &str, offset: u64) -> StoreResult<ObjectReader> {
        let data = self.lookup(key)?.data;
        if offset >= data.len() as u64 {
            return Err(StoreError::InvalidRange);
        }
        let start = usize::try_from(offset).map_err(|_| StoreError::InvalidRange)?;
        let reader: ObjectReader = Box::pin(std::io::Cursor::new(data.slice(start..)));
        Ok(reader)
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        let data = self.lookup(key)?.data;
        let size = data.len() as u64;
        let end = end.min(size);
        if start >= size || start >= end {
            return Err(StoreError::InvalidRange);
        }
        let start_idx = usize::try_from(start).map_err(|_| StoreError::InvalidRange)?;
        let end_idx = usize::try_from(end).map_err(|_| StoreError::InvalidRange)?;
        Ok(data.slice(start_idx..end_idx))
    }

    async fn put(&self, key: &str, body: Bytes) -> StoreResult<()> {
        let etag = checksums::object_etag(&body);
        self.insert(key, body, etag);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.objects.write().remove(key).is_some() {
            trace!(key, "deleted object");
        }
        Ok(())
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        Ok(self.lookup(key)?.meta(key))
    }

    async fn list(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: Option<usize>,
    ) -> StoreResult<ListPage> {
        let start_after = continuation_token
            .map(decode_continuation_token)
            .transpose()?;
        let limit = max_keys.map_or(self.page_size, |m| m.min(self.page_size)).max(1);

        let lower = match start_after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Included(prefix.to_owned()),
        };

        let objects = self.objects.read();
        let mut page = ListPage::default();
        for (key, object) in objects.range((lower, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                // Keys sharing the prefix are contiguous in sort order.
                if key.as_str() > prefix {
                    break;
                }
                continue;
            }
            if page.objects.len() >= limit {
                page.is_truncated = true;
                break;
            }
            page.objects.push(object.meta(key));
        }
        drop(objects);

        if page.is_truncated {
            page.next_continuation_token = page
                .objects
                .last()
                .map(|o| encode_continuation_token(&o.key));
        }

        trace!(
            prefix,
            count = page.objects.len(),
            is_truncated = page.is_truncated,
            "listed objects"
        );
        Ok(page)
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> StoreResult<()> {
        let source = self.lookup(src_key)?;
        self.insert(dst_key, source.data, source.etag);
        Ok(())
    }

    async fn start_multipart(&self, key: &str) -> StoreResult<String> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument {
                message: "object key must not be empty".to_owned(),
            });
        }
        let upload_id = Uuid::new_v4().simple().to_string();
        self.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_owned(),
                initiated: Utc::now(),
                parts: BTreeMap::new(),
            },
        );
        debug!(key, upload_id = %upload_id, "started multipart upload");
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> StoreResult<String> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(StoreError::InvalidArgument {
                message: format!("part number must be between 1 and {MAX_PART_NUMBER}"),
            });
        }

        let mut upload = self
            .uploads
            .get_mut(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| StoreError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            })?;

        let etag = checksums::object_etag(&body);
        let size = body.len();
        upload.parts.insert(
            part_number,
            StoredPart {
                data: body,
                etag: etag.clone(),
            },
        );
        trace!(key, upload_id, part_number, size, "stored part");
        Ok(etag)
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        if parts.is_empty() {
            return Err(StoreError::InvalidArgument {
                message: "at least one part must be specified".to_owned(),
            });
        }

        let (data, etag) = {
            let upload = self
                .uploads
                .get(upload_id)
                .filter(|u| u.key == key)
                .ok_or_else(|| StoreError::NoSuchUpload {
                    upload_id: upload_id.to_owned(),
                })?;

            let mut combined = BytesMut::new();
            let mut etag = MultipartEtag::default();
            let mut last_number = 0u32;
            for part in parts {
                if part.part_number <= last_number {
                    return Err(StoreError::InvalidPartOrder);
                }
                last_number = part.part_number;

                let stored = upload
                    .parts
                    .get(&part.part_number)
                    .filter(|p| same_etag(&p.etag, &part.etag))
                    .ok_or(StoreError::InvalidPart)?;
                combined.extend_from_slice(&stored.data);
                etag.push(&stored.data);
            }
            (combined.freeze(), etag.finish())
        };

        let size = data.len();
        self.insert(key, data, etag);
        if let Some((_, upload)) = self.uploads.remove(upload_id) {
            debug!(
                key,
                upload_id,
                size,
                parts = parts.len(),
                initiated = %upload.initiated,
                "completed multipart upload"
            );
        }
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StoreResult<()> {
        let removed = self.uploads.remove_if(upload_id, |_, u| u.key == key);
        match removed {
            Some((_, upload)) => {
                debug!(
                    key,
                    upload_id,
                    parts = upload.parts.len(),
                    "aborted multipart upload"
                );
                Ok(())
            }
            None => Err(StoreError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            }),
        }
    }
}

/// Compare entity tags ignoring surrounding quotes.
fn same_etag(a: &str, b: &str) -> bool {
    a.trim_matches('"') == b.trim_matches('"')
}

/// Encode the last returned key as an opaque continuation token.
fn encode_continuation_token(key: &str) -> String {
    BASE64_STANDARD.encode(key.as_bytes())
}

/// Decode a continuation token back to the key to resume after.
fn decode_continuation_token(token: &str) -> StoreResult<String> {
    let bytes = BASE64_STANDARD
        .decode(token)
        .map_err(|_| StoreError::InvalidArgument {
            message: "invalid continuation token".to_owned(),
        })?;
    String::from_utf8(bytes).map_err(|_| StoreError::InvalidArgument {
        message: "continuation token contains invalid UTF-8".to_owned(),
    })
}
