//! Chunked upload session.
//!
//! A [`MultipartUpload`] sends a large payload as a sequence of numbered
//! parts and then asks the store to assemble them into one object. The
//! object only becomes visible on a successful [`MultipartUpload::complete`];
//! [`MultipartUpload::abort`] discards everything uploaded so far.
//!
//! Session state lives behind an async mutex that is held across the store
//! call of [`MultipartUpload::upload_part`], so concurrent callers are
//! serialized and part numbers are assigned without gaps.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::path;
use crate::store::{CompletedPart, ObjectStore};

/// Smallest part size the store accepts for non-final parts (5 MiB).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Part size used when none is configured (10 MiB).
pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;

/// Upper bound on the chunk buffer reserved up front by `upload_from_reader`.
const MAX_CHUNK_PREALLOC: usize = 64 * 1024 * 1024;

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadState {
    /// Accepting parts.
    Active,
    /// Assembled into the final object.
    Completed,
    /// Discarded.
    Aborted,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct SessionState {
    part_size: u64,
    next_part_number: u32,
    parts: Vec<CompletedPart>,
    state: UploadState,
}

/// An in-progress chunked upload to a single key.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use s3fs_core::{InMemoryStore, MultipartUpload, ObjectStore, UploadState, MIN_PART_SIZE};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(InMemoryStore::new());
/// let upload = MultipartUpload::start(store.clone(), "backups/db.dump", MIN_PART_SIZE)
///     .await
///     .unwrap();
///
/// upload.upload_part(vec![1u8; 16]).await.unwrap();
/// upload.upload_part(vec![2u8; 16]).await.unwrap();
/// upload.complete().await.unwrap();
///
/// assert_eq!(upload.state().await, UploadState::Completed);
/// assert_eq!(store.head("backups/db.dump").await.unwrap().size, 32);
/// # });
/// ```
#[derive(Debug)]
pub struct MultipartUpload {
    store: Arc<dyn ObjectStore>,
    key: String,
    upload_id: String,
    inner: Mutex<SessionState>,
}

impl MultipartUpload {
    /// Begin a session for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidKey`] for an unusable key,
    /// [`FsError::PartSizeTooSmall`] if `part_size` is below
    /// [`MIN_PART_SIZE`], or [`FsError::StoreOperationFailed`] if the store
    /// refuses to start the upload.
    pub async fn start(
        store: Arc<dyn ObjectStore>,
        key: &str,
        part_size: u64,
    ) -> FsResult<Self> {
        let key = path::normalize(key);
        path::validate_key(key)?;
        check_part_size(part_size)?;

        let upload_id = store
            .start_multipart(key)
            .await
            .map_err(|e| FsError::store("multipart_start", key, e))?;

        debug!(key, upload_id = %upload_id, part_size, "multipart upload started");
        Ok(Self {
            store,
            key: key.to_owned(),
            upload_id,
            inner: Mutex::new(SessionState {
                part_size,
                next_part_number: 1,
                parts: Vec::new(),
                state: UploadState::Active,
            }),
        })
    }

    /// Target key of the upload.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Store-issued upload identifier.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Current target part size in bytes.
    pub async fn part_size(&self) -> u64 {
        self.inner.lock().await.part_size
    }

    /// Number the next accepted part will carry.
    pub async fn next_part_number(&self) -> u32 {
        self.inner.lock().await.next_part_number
    }

    /// Accepted parts, in submission order.
    pub async fn parts(&self) -> Vec<CompletedPart> {
        self.inner.lock().await.parts.clone()
    }

    /// Lifecycle state.
    pub async fn state(&self) -> UploadState {
        self.inner.lock().await.state
    }

    /// Change the target part size.
    ///
    /// # Errors
    ///
    /// [`FsError::PartSizeTooSmall`] below [`MIN_PART_SIZE`],
    /// [`FsError::PartSizeLocked`] once any part has been accepted, and
    /// [`FsError::UploadClosed`] after completion or abort.
    pub async fn set_part_size(&self, size: u64) -> FsResult<()> {
        let mut inner = self.inner.lock().await;
        self.ensure_active(&inner)?;
        check_part_size(size)?;
        if !inner.parts.is_empty() {
            return Err(FsError::PartSizeLocked {
                parts: inner.parts.len(),
            });
        }
        inner.part_size = size;
        Ok(())
    }

    /// Upload `data` as the next part and return its part number.
    ///
    /// A failed upload leaves the session untouched, so a retry reuses the
    /// same part number.
    ///
    /// # Errors
    ///
    /// [`FsError::UploadClosed`] on a terminal session, or
    /// [`FsError::StoreOperationFailed`] if the store rejects the part.
    pub async fn upload_part(&self, data: impl Into<Bytes>) -> FsResult<u32> {
        let body = data.into();
        let mut inner = self.inner.lock().await;
        self.ensure_active(&inner)?;

        let part_number = inner.next_part_number;
        let size = body.len();
        let etag = self
            .store
            .upload_part(&self.key, &self.upload_id, part_number, body)
            .await
            .map_err(|e| FsError::store("multipart_upload_part", self.key.as_str(), e))?;

        inner.parts.push(CompletedPart { part_number, etag });
        inner.next_part_number += 1;
        debug!(
            key = %self.key,
            upload_id = %self.upload_id,
            part_number,
            size,
            "uploaded part"
        );
        Ok(part_number)
    }

    /// Stream `reader` to the store in `part_size` chunks.
    ///
    /// Every full chunk and the final non-empty partial chunk is uploaded as
    /// one part. Returns the number of parts uploaded by this call.
    ///
    /// # Errors
    ///
    /// [`FsError::Io`] if reading fails, or any error of
    /// [`upload_part`](Self::upload_part). Parts uploaded before the failure
    /// stay recorded.
    pub async fn upload_from_reader<R>(&self, reader: &mut R) -> FsResult<usize>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let part_size = {
            let inner = self.inner.lock().await;
            self.ensure_active(&inner)?;
            inner.part_size
        };
        let capacity = usize::try_from(part_size)
            .unwrap_or(usize::MAX)
            .min(MAX_CHUNK_PREALLOC);

        let mut uploaded = 0;
        loop {
            let mut chunk = Vec::with_capacity(capacity);
            let filled = (&mut *reader)
                .take(part_size)
                .read_to_end(&mut chunk)
                .await?;
            if filled == 0 {
                break;
            }
            self.upload_part(chunk).await?;
            uploaded += 1;
            if (filled as u64) < part_size {
                break;
            }
        }
        Ok(uploaded)
    }

    /// Ask the store to assemble the accepted parts into the final object.
    ///
    /// # Errors
    ///
    /// [`FsError::UploadClosed`] on a terminal session, or
    /// [`FsError::StoreOperationFailed`] if the store rejects the manifest.
    /// On failure the session stays active and may still be aborted.
    pub async fn complete(&self) -> FsResult<()> {
        let mut inner = self.inner.lock().await;
        self.ensure_active(&inner)?;

        let mut manifest = inner.parts.clone();
        manifest.sort_by_key(|p| p.part_number);
        self.store
            .complete_multipart(&self.key, &self.upload_id, &manifest)
            .await
            .map_err(|e| FsError::store("multipart_complete", self.key.as_str(), e))?;

        inner.state = UploadState::Completed;
        debug!(
            key = %self.key,
            upload_id = %self.upload_id,
            parts = manifest.len(),
            "multipart upload completed"
        );
        Ok(())
    }

    /// Discard the upload and every part sent so far.
    ///
    /// # Errors
    ///
    /// [`FsError::UploadClosed`] on a terminal session, or
    /// [`FsError::StoreOperationFailed`] if the store call fails. On failure
    /// the session stays active.
    pub async fn abort(&self) -> FsResult<()> {
        let mut inner = self.inner.lock().await;
        self.ensure_active(&inner)?;

        self.store
            .abort_multipart(&self.key, &self.upload_id)
            .await
            .map_err(|e| FsError::store("multipart_abort", self.key.as_str(), e))?;

        inner.state = UploadState::Aborted;
        debug!(
            key = %self.key,
            upload_id = %self.upload_id,
            parts = inner.parts.len(),
            "multipart upload aborted"
        );
        Ok(())
    }

    fn ensure_active(&self, inner: &SessionState) -> FsResult<()> {
        match inner.state {
            UploadState::Active => Ok(()),
            state => Err(FsError::UploadClosed {
                key: self.key.clone(),
                state,
            }),
        }
    }
}

fn check_part_size(size: u64) -> FsResult<()> {
    if size < MIN_PART_SIZE {
        return Err(FsError::PartSizeTooSmall {
            size,
            minimum: MIN_PART_SIZE,
        });
    }
    Ok(())
}
