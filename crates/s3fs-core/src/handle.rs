//! Buffered read/write file handle.
//!
//! A [`Handle`] is opened either for reading or for writing, never both.
//!
//! - Read handles stream the object lazily: nothing is fetched until the
//!   first [`Handle::read`], which opens one streaming fetch that later reads
//!   continue on. A seek drops that stream; the next read opens a new one
//!   at the new position. [`Handle::read_at`] issues an independent range
//!   fetch per call.
//! - Write handles buffer every byte in memory. Nothing reaches the store
//!   until [`Handle::close`] uploads the whole buffer as one object.

use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{FsError, FsResult, StoreError};
use crate::path;
use crate::store::{FileInfo, ObjectReader, ObjectStore};
use crate::tree;

/// Mode a [`Handle`] was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpenMode {
    /// Stream an existing object.
    Read,
    /// Buffer a new object, uploaded on close.
    Write,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("reading"),
            Self::Write => f.write_str("writing"),
        }
    }
}

enum ModeState {
    Read {
        // Behind a mutex only so that `Handle` is `Sync` for `read_at`.
        cursor: Mutex<Option<ObjectReader>>,
        stream_offset: u64,
    },
    Write {
        buffer: Vec<u8>,
    },
}

impl ModeState {
    fn mode(&self) -> OpenMode {
        match self {
            Self::Read { .. } => OpenMode::Read,
            Self::Write { .. } => OpenMode::Write,
        }
    }
}

/// One open file.
///
/// # Examples
///
/// ```
/// use std::io::SeekFrom;
/// use std::sync::Arc;
///
/// use s3fs_core::{Handle, InMemoryStore, ObjectStore, OpenMode};
///
/// # tokio_test::block_on(async {
/// let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
///
/// let mut writer = Handle::new(store.clone(), "notes.txt", OpenMode::Write);
/// writer.write(b"hello world").unwrap();
/// writer.close().await.unwrap();
///
/// let mut reader = Handle::new(store, "notes.txt", OpenMode::Read);
/// reader.seek(SeekFrom::Start(6)).unwrap();
/// let mut buf = [0u8; 5];
/// let n = reader.read(&mut buf).await.unwrap();
/// assert_eq!(&buf[..n], b"world");
/// # });
/// ```
pub struct Handle {
    store: Arc<dyn ObjectStore>,
    key: String,
    position: u64,
    closed: bool,
    state: ModeState,
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Handle");
        s.field("key", &self.key)
            .field("mode", &self.mode())
            .field("position", &self.position)
            .field("closed", &self.closed);
        if let ModeState::Write { buffer } = &self.state {
            s.field("buffered", &buffer.len());
        }
        s.finish_non_exhaustive()
    }
}

impl Handle {
    /// Create a handle for `key`. No store call is made.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>, mode: OpenMode) -> Self {
        let state = match mode {
            OpenMode::Read => ModeState::Read {
                cursor: Mutex::new(None),
                stream_offset: 0,
            },
            OpenMode::Write => ModeState::Write { buffer: Vec::new() },
        };
        Self {
            store,
            key: key.into(),
            position: 0,
            closed: false,
            state,
        }
    }

    /// The object key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The last path segment of the key.
    #[must_use]
    pub fn name(&self) -> &str {
        path::base_name(&self.key)
    }

    /// The mode the handle was opened with.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.state.mode()
    }

    /// Current logical offset.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether [`close`](Self::close) has succeeded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read up to `buf.len()` bytes at the current position.
    ///
    /// The first call opens a streaming fetch; later calls continue on it.
    /// After a seek the stream is reopened at the new position. Returns `0`
    /// at end of data.
    ///
    /// # Errors
    ///
    /// [`FsError::ModeMismatch`] on a write handle, [`FsError::Closed`] after
    /// close, [`FsError::StoreOperationFailed`] if the fetch fails, or
    /// [`FsError::Io`] if the stream breaks.
    pub async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.ensure_open()?;
        let ModeState::Read {
            cursor,
            stream_offset,
        } = &mut self.state
        else {
            return Err(mode_mismatch("read", OpenMode::Write));
        };
        if buf.is_empty() {
            return Ok(0);
        }

        let cursor = cursor.get_mut();
        if cursor.is_some() && *stream_offset != self.position {
            *cursor = None;
        }
        if cursor.is_none() {
            match open_stream(self.store.as_ref(), &self.key, self.position).await? {
                Some(reader) => {
                    *cursor = Some(reader);
                    *stream_offset = self.position;
                }
                None => return Ok(0),
            }
        }
        let Some(reader) = cursor.as_mut() else {
            return Ok(0);
        };

        let n = reader.read(buf).await?;
        *stream_offset += n as u64;
        self.position += n as u64;
        Ok(n)
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Every call is an independent range fetch; the read position and the
    /// stream are untouched, so concurrent calls are safe. An offset at or
    /// past the end of the object returns `0`.
    ///
    /// # Errors
    ///
    /// [`FsError::ModeMismatch`] on a write handle, [`FsError::Closed`] after
    /// close, or [`FsError::StoreOperationFailed`] if the fetch fails.
    pub async fn read_at(&self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        self.ensure_open()?;
        if let ModeState::Write { .. } = self.state {
            return Err(mode_mismatch("read", OpenMode::Write));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let end = offset.saturating_add(buf.len() as u64);
        match self.store.get_range(&self.key, offset, end).await {
            Ok(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Err(StoreError::InvalidRange) => Ok(0),
            Err(e) => Err(FsError::store("read_at", self.key.as_str(), e)),
        }
    }

    /// Write `data` at the current position and advance it.
    ///
    /// A position past the end of the buffer zero-fills the gap. No store
    /// call is made.
    ///
    /// # Errors
    ///
    /// [`FsError::ModeMismatch`] on a read handle or [`FsError::Closed`]
    /// after close.
    pub fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        let offset = self.position;
        overlay(self.buffer_mut("write")?, offset, data)?;
        self.position += data.len() as u64;
        Ok(data.len())
    }

    /// Write a string at the current position.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn write_str(&mut self, s: &str) -> FsResult<usize> {
        self.write(s.as_bytes())
    }

    /// Write `data` at `offset` without moving the position.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn write_at(&mut self, data: &[u8], offset: u64) -> FsResult<usize> {
        overlay(self.buffer_mut("write")?, offset, data)?;
        Ok(data.len())
    }

    /// Shrink or zero-extend the buffer to exactly `size` bytes.
    ///
    /// # Errors
    ///
    /// [`FsError::ModeMismatch`] on a read handle or [`FsError::Closed`]
    /// after close.
    pub fn truncate(&mut self, size: u64) -> FsResult<()> {
        let len = to_index(size)?;
        self.buffer_mut("truncate")?.resize(len, 0);
        Ok(())
    }

    /// Move the position and return the new value.
    ///
    /// # Errors
    ///
    /// [`FsError::UnsupportedSeek`] for [`SeekFrom::End`],
    /// [`FsError::InvalidSeek`] if the result would be negative, or
    /// [`FsError::Closed`] after close.
    pub fn seek(&mut self, pos: SeekFrom) -> FsResult<u64> {
        self.ensure_open()?;
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(_) => return Err(FsError::UnsupportedSeek),
        };
        self.position =
            u64::try_from(target).map_err(|_| FsError::InvalidSeek { position: target })?;
        Ok(self.position)
    }

    /// Flush buffered data. Data only reaches the store on close, so this
    /// does nothing beyond checking the handle is open.
    ///
    /// # Errors
    ///
    /// [`FsError::Closed`] after close.
    pub fn sync(&mut self) -> FsResult<()> {
        self.ensure_open()
    }

    /// Close the handle.
    ///
    /// A read handle drops its stream. A write handle uploads the whole
    /// buffer as one object; this is the only point written data becomes
    /// visible. If the upload fails the handle stays open with its buffer
    /// intact so close can be retried. Closing a closed handle does nothing.
    ///
    /// # Errors
    ///
    /// [`FsError::StoreOperationFailed`] if the upload fails.
    pub async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        match &mut self.state {
            ModeState::Read { cursor, .. } => {
                *cursor.get_mut() = None;
            }
            ModeState::Write { buffer } => {
                let body = Bytes::from(std::mem::take(buffer));
                let size = body.len();
                if let Err(e) = self.store.put(&self.key, body.clone()).await {
                    *buffer = Vec::from(body);
                    return Err(FsError::store("close", self.key.as_str(), e));
                }
                debug!(key = %self.key, size, "uploaded file on close");
            }
        }
        self.closed = true;
        Ok(())
    }

    /// Fetch the object's metadata.
    ///
    /// # Errors
    ///
    /// [`FsError::StoreOperationFailed`] if the object does not exist or the
    /// store call fails.
    pub async fn stat(&self) -> FsResult<FileInfo> {
        let meta = self
            .store
            .head(&self.key)
            .await
            .map_err(|e| FsError::store("stat", self.key.as_str(), e))?;
        Ok(FileInfo::from_meta(&meta))
    }

    /// List objects under this key treated as a directory.
    ///
    /// Entries are named by their full key. `limit` caps the number of
    /// entries; `None` lists everything.
    ///
    /// # Errors
    ///
    /// [`FsError::StoreOperationFailed`] if a listing fails.
    pub async fn read_dir(&self, limit: Option<usize>) -> FsResult<Vec<FileInfo>> {
        tree::list_dir(self.store.as_ref(), &path::dir_prefix(&self.key), limit).await
    }

    /// Like [`read_dir`](Self::read_dir) but returns only the names.
    ///
    /// # Errors
    ///
    /// Same as [`read_dir`](Self::read_dir).
    pub async fn read_dir_names(&self, limit: Option<usize>) -> FsResult<Vec<String>> {
        let entries = self.read_dir(limit).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::Closed {
                key: self.key.clone(),
            });
        }
        Ok(())
    }

    fn buffer_mut(&mut self, operation: &'static str) -> FsResult<&mut Vec<u8>> {
        self.ensure_open()?;
        match &mut self.state {
            ModeState::Write { buffer } => Ok(buffer),
            ModeState::Read { .. } => Err(mode_mismatch(operation, OpenMode::Read)),
        }
    }
}

fn mode_mismatch(operation: &'static str, mode: OpenMode) -> FsError {
    FsError::ModeMismatch { operation, mode }
}

fn to_index(offset: u64) -> FsResult<usize> {
    usize::try_from(offset)
        .map_err(|_| FsError::Io(std::io::Error::other("offset exceeds addressable memory")))
}

/// Copy `data` into `buffer` at `offset`, zero-extending as needed.
fn overlay(buffer: &mut Vec<u8>, offset: u64, data: &[u8]) -> FsResult<()> {
    let start = to_index(offset)?;
    let end = start
        .checked_add(data.len())
        .ok_or_else(|| FsError::Io(std::io::Error::other("write extends past addressable memory")))?;
    if buffer.len() < end {
        buffer.resize(end, 0);
    }
    buffer[start..end].copy_from_slice(data);
    Ok(())
}

/// Open a stream positioned at `offset`, or `None` when `offset` is at or
/// past the end of the object.
async fn open_stream(
    store: &dyn ObjectStore,
    key: &str,
    offset: u64,
) -> FsResult<Option<ObjectReader>> {
    if offset == 0 {
        let reader = store
            .get(key)
            .await
            .map_err(|e| FsError::store("read", key, e))?;
        return Ok(Some(reader));
    }
    match store.get_from(key, offset).await {
        Ok(reader) => Ok(Some(reader)),
        Err(StoreError::InvalidRange) => Ok(None),
        Err(e) => Err(FsError::store("read", key, e)),
    }
}
