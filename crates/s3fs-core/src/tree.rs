//! Directory semantics over prefix listings.
//!
//! The store has no directories. A directory `d` exists when at least one
//! object key starts with `d/`; a zero-byte object named `d/` (a marker) is
//! only a hint that keeps an otherwise empty directory visible.
//!
//! None of these operations is atomic: concurrent writers may add or remove
//! objects while a listing is being consumed.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::{FsError, FsResult};
use crate::path;
use crate::store::{FileInfo, ObjectStore};

/// Whether an object exists at exactly `key`.
///
/// Every failure, not only a missing key, is reported as `false`.
pub async fn exists(store: &dyn ObjectStore, key: &str) -> bool {
    let key = path::normalize(key);
    match store.head(key).await {
        Ok(_) => true,
        Err(e) => {
            if !e.is_not_found() {
                warn!(key, error = %e, "existence probe failed");
            }
            false
        }
    }
}

/// Whether any object lives under `key/`. The empty key is the bucket root.
///
/// # Errors
///
/// [`FsError::StoreOperationFailed`] if the listing fails.
pub async fn is_directory(store: &dyn ObjectStore, key: &str) -> FsResult<bool> {
    let prefix = listing_prefix(path::normalize(key));
    let page = store
        .list(&prefix, None, Some(1))
        .await
        .map_err(|e| FsError::store("is_directory", prefix.as_str(), e))?;
    Ok(!page.objects.is_empty())
}

/// Put a marker at every directory level of `key` that has no object yet.
///
/// `"a/b/c"` ensures `a/`, `a/b/` and `a/b/c/`, shallowest first. An empty
/// key or `"."` does nothing.
///
/// # Errors
///
/// [`FsError::StoreOperationFailed`] on the first failed put. Markers
/// created before the failure are kept.
pub async fn create_recursive(store: &dyn ObjectStore, key: &str) -> FsResult<()> {
    let key = path::normalize(key);
    if key.is_empty() || key == "." {
        return Ok(());
    }

    let mut created = 0usize;
    for level in path::dir_levels(key) {
        if exists(store, &level).await {
            continue;
        }
        store
            .put(&level, Bytes::new())
            .await
            .map_err(|e| FsError::store("mkdir_all", level.as_str(), e))?;
        trace!(key = %level, "created directory marker");
        created += 1;
    }
    debug!(key, created, "created directory tree");
    Ok(())
}

/// Delete `key` and, if it is a directory, everything under it.
///
/// A key without a trailing separator is treated as a directory when
/// objects exist under `key/`; a failed probe falls back to deleting the
/// single object. Missing objects are ignored, so a partially failed removal
/// can simply be retried.
///
/// # Errors
///
/// [`FsError::InvalidKey`] for an empty key, or
/// [`FsError::StoreOperationFailed`] on the first failed listing or delete.
/// Nothing deleted before the failure is restored.
pub async fn remove_recursive(store: &dyn ObjectStore, key: &str) -> FsResult<()> {
    let key = path::normalize(key);
    path::validate_key(key)?;

    let target = if path::is_dir_key(key) {
        key.to_owned()
    } else {
        match is_directory(store, key).await {
            Ok(true) => path::dir_prefix(key),
            Ok(false) => key.to_owned(),
            Err(e) => {
                warn!(key, error = %e, "directory probe failed, removing single object");
                key.to_owned()
            }
        }
    };

    if path::is_dir_key(&target) {
        remove_prefix(store, &target).await
    } else {
        delete_object(store, &target).await?;
        debug!(key = %target, "removed object");
        Ok(())
    }
}

async fn remove_prefix(store: &dyn ObjectStore, prefix: &str) -> FsResult<()> {
    let mut removed = 0usize;
    let mut token: Option<String> = None;
    loop {
        let page = store
            .list(prefix, token.as_deref(), None)
            .await
            .map_err(|e| FsError::store("remove_all", prefix, e))?;
        for object in &page.objects {
            delete_object(store, &object.key).await?;
            trace!(key = %object.key, "removed object");
            removed += 1;
        }
        match page.next_continuation_token {
            Some(next) if page.is_truncated => token = Some(next),
            _ => break,
        }
    }
    debug!(prefix, removed, "removed directory tree");
    Ok(())
}

async fn delete_object(store: &dyn ObjectStore, key: &str) -> FsResult<()> {
    match store.delete(key).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(FsError::store("remove_all", key, e)),
    }
}

/// Visit every object under `root`, in key order, each key exactly once.
///
/// An empty root walks the whole bucket. A root that names a single object
/// (and has nothing under `root/`) is visited once on its own. `visit`
/// receives the object key and its metadata; returning an error stops the
/// walk with that error. A listing failure is handed to `visit` as an `Err`
/// together with the prefix being listed, and whatever `visit` returns
/// becomes the result of the walk.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use s3fs_core::{InMemoryStore, ObjectStore, tree};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryStore::new();
/// for key in ["d/x", "d/y", "d/sub/z"] {
///     store.put(key, Bytes::new()).await.unwrap();
/// }
///
/// let mut seen = Vec::new();
/// tree::walk(&store, "d", |key, info| {
///     info?;
///     seen.push(key.to_owned());
///     Ok(())
/// })
/// .await
/// .unwrap();
/// assert_eq!(seen, ["d/sub/z", "d/x", "d/y"]);
/// # });
/// ```
///
/// # Errors
///
/// Whatever `visit` returns.
pub async fn walk<F>(store: &dyn ObjectStore, root: &str, mut visit: F) -> FsResult<()>
where
    F: FnMut(&str, FsResult<&FileInfo>) -> FsResult<()>,
{
    let root = path::normalize(root);

    let prefix = if root.is_empty() || path::is_dir_key(root) {
        root.to_owned()
    } else if is_directory(store, root).await.unwrap_or(false) {
        path::dir_prefix(root)
    } else {
        match store.head(root).await {
            Ok(meta) => {
                let info = FileInfo::from_meta(&meta);
                return visit(root, Ok(&info));
            }
            Err(_) => path::dir_prefix(root),
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut token: Option<String> = None;
    loop {
        let page = match store.list(&prefix, token.as_deref(), None).await {
            Ok(page) => page,
            Err(e) => return visit(&prefix, Err(FsError::store("walk", prefix.as_str(), e))),
        };
        for meta in &page.objects {
            if !seen.insert(meta.key.clone()) {
                continue;
            }
            let info = FileInfo::from_meta(meta);
            visit(&meta.key, Ok(&info))?;
        }
        match page.next_continuation_token {
            Some(next) if page.is_truncated => token = Some(next),
            _ => break,
        }
    }
    debug!(prefix = %prefix, visited = seen.len(), "walk finished");
    Ok(())
}

/// List objects under `prefix` as entries named by their full key.
///
/// `limit` caps the number of entries returned; `None` or `Some(0)` lists
/// everything.
///
/// # Errors
///
/// [`FsError::StoreOperationFailed`] if a listing fails.
pub async fn list_dir(
    store: &dyn ObjectStore,
    prefix: &str,
    limit: Option<usize>,
) -> FsResult<Vec<FileInfo>> {
    let limit = limit.filter(|&n| n > 0);
    let mut entries = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let remaining = limit.map(|n| n - entries.len());
        let page = store
            .list(prefix, token.as_deref(), remaining)
            .await
            .map_err(|e| FsError::store("read_dir", prefix, e))?;
        entries.extend(page.objects.iter().map(FileInfo::listing_entry));
        if let Some(n) = limit {
            if entries.len() >= n {
                entries.truncate(n);
                break;
            }
        }
        match page.next_continuation_token {
            Some(next) if page.is_truncated => token = Some(next),
            _ => break,
        }
    }
    Ok(entries)
}

fn listing_prefix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        path::dir_prefix(key)
    }
}
