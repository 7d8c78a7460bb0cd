//! The filesystem facade.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::handle::{Handle, OpenMode};
use crate::multipart::MultipartUpload;
use crate::path;
use crate::store::{FileInfo, ObjectStore};
use crate::tree;

/// A hierarchical view of one bucket.
///
/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct FileSystem {
    store: Arc<dyn ObjectStore>,
    config: FsConfig,
}

impl FileSystem {
    /// Create a filesystem over `store` with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_config(store, FsConfig::default())
    }

    /// Create a filesystem over `store` with the given configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn ObjectStore>, config: FsConfig) -> Self {
        Self { store, config }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Open `name` for reading. Nothing is fetched until the first read.
    ///
    /// # Errors
    ///
    /// [`FsError::InvalidKey`] for an unusable path.
    pub fn open(&self, name: &str) -> FsResult<Handle> {
        self.open_file(name, OpenMode::Read)
    }

    /// Open `name` for writing. The object is written on close.
    ///
    /// # Errors
    ///
    /// [`FsError::InvalidKey`] for an unusable path.
    pub fn create(&self, name: &str) -> FsResult<Handle> {
        self.open_file(name, OpenMode::Write)
    }

    /// Open `name` in the given mode.
    ///
    /// # Errors
    ///
    /// [`FsError::InvalidKey`] for an unusable path.
    pub fn open_file(&self, name: &str, mode: OpenMode) -> FsResult<Handle> {
        let key = object_key(name)?;
        Ok(Handle::new(Arc::clone(&self.store), key, mode))
    }

    /// Create a directory marker for `name`. Parents are not created.
    ///
    /// # Errors
    ///
    /// [`FsError::InvalidKey`] for an unusable path, or
    /// [`FsError::StoreOperationFailed`] if the put fails.
    pub async fn mkdir(&self, name: &str) -> FsResult<()> {
        let marker = path::dir_prefix(object_key(name)?);
        self.store
            .put(&marker, Bytes::new())
            .await
            .map_err(|e| FsError::store("mkdir", marker.as_str(), e))?;
        debug!(key = %marker, "created directory marker");
        Ok(())
    }

    /// Create markers for `name` and every missing parent.
    ///
    /// # Errors
    ///
    /// See [`tree::create_recursive`].
    pub async fn mkdir_all(&self, name: &str) -> FsResult<()> {
        tree::create_recursive(self.store.as_ref(), name).await
    }

    /// Delete the single object `name`. Deleting a missing object succeeds.
    ///
    /// # Errors
    ///
    /// [`FsError::InvalidKey`] for an unusable path, or
    /// [`FsError::StoreOperationFailed`] if the delete fails.
    pub async fn remove(&self, name: &str) -> FsResult<()> {
        let key = object_key(name)?;
        self.store
            .delete(key)
            .await
            .map_err(|e| FsError::store("remove", key, e))?;
        debug!(key, "removed object");
        Ok(())
    }

    /// Delete `name` and everything under it.
    ///
    /// # Errors
    ///
    /// See [`tree::remove_recursive`].
    pub async fn remove_all(&self, name: &str) -> FsResult<()> {
        tree::remove_recursive(self.store.as_ref(), name).await
    }

    /// Move `old_name` to `new_name` by copying then deleting.
    ///
    /// Not atomic: if the delete fails both objects exist.
    ///
    /// # Errors
    ///
    /// [`FsError::InvalidKey`] for an unusable path, or
    /// [`FsError::StoreOperationFailed`] if the copy or delete fails.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> FsResult<()> {
        let old_key = object_key(old_name)?;
        let new_key = object_key(new_name)?;

        self.store
            .copy(old_key, new_key)
            .await
            .map_err(|e| FsError::store("rename", old_key, e))?;
        self.store
            .delete(old_key)
            .await
            .map_err(|e| FsError::store("rename", old_key, e))?;
        debug!(from = old_key, to = new_key, "renamed object");
        Ok(())
    }

    /// Metadata of the object `name`.
    ///
    /// # Errors
    ///
    /// [`FsError::StoreOperationFailed`] if the object does not exist (see
    /// [`FsError::is_not_found`]) or the store call fails.
    pub async fn stat(&self, name: &str) -> FsResult<FileInfo> {
        let key = path::normalize(name);
        let meta = self
            .store
            .head(key)
            .await
            .map_err(|e| FsError::store("stat", key, e))?;
        Ok(FileInfo::from_meta(&meta))
    }

    /// Whether an object exists at exactly `name`.
    pub async fn exists(&self, name: &str) -> bool {
        tree::exists(self.store.as_ref(), name).await
    }

    /// Whether any object lives under `name/`.
    ///
    /// # Errors
    ///
    /// See [`tree::is_directory`].
    pub async fn is_dir(&self, name: &str) -> FsResult<bool> {
        tree::is_directory(self.store.as_ref(), name).await
    }

    /// Visit every object under `root`.
    ///
    /// # Errors
    ///
    /// See [`tree::walk`].
    pub async fn walk<F>(&self, root: &str, visit: F) -> FsResult<()>
    where
        F: FnMut(&str, FsResult<&FileInfo>) -> FsResult<()>,
    {
        tree::walk(self.store.as_ref(), root, visit).await
    }

    /// List objects under `name/`, or the whole bucket for an empty name.
    ///
    /// # Errors
    ///
    /// See [`tree::list_dir`].
    pub async fn read_dir(&self, name: &str, limit: Option<usize>) -> FsResult<Vec<FileInfo>> {
        let key = path::normalize(name);
        let prefix = if key.is_empty() {
            String::new()
        } else {
            path::dir_prefix(key)
        };
        tree::list_dir(self.store.as_ref(), &prefix, limit).await
    }

    /// Start a chunked upload to `key` using the configured part size.
    ///
    /// # Errors
    ///
    /// See [`MultipartUpload::start`].
    pub async fn new_multipart_upload(&self, key: &str) -> FsResult<MultipartUpload> {
        MultipartUpload::start(Arc::clone(&self.store), key, self.config.part_size).await
    }
}

fn object_key(name: &str) -> FsResult<&str> {
    let key = path::normalize(name);
    path::validate_key(key)?;
    Ok(key)
}
