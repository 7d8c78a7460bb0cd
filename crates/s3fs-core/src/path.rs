//! Key normalization helpers.
//!
//! Object keys never start with `/`; a trailing `/` is the only thing that
//! marks a key as directory-like.

use crate::error::{FsError, FsResult};

/// Key separator.
pub const SEPARATOR: char = '/';

/// Maximum key length in bytes accepted by S3.
const MAX_KEY_BYTES: usize = 1024;

/// Strip leading separators from a caller path.
///
/// # Examples
///
/// ```
/// use s3fs_core::path::normalize;
///
/// assert_eq!(normalize("/a/b.txt"), "a/b.txt");
/// assert_eq!(normalize("a/"), "a/");
/// ```
#[must_use]
pub fn normalize(path: &str) -> &str {
    path.trim_start_matches(SEPARATOR)
}

/// Return `key` with exactly one trailing separator appended if missing.
///
/// # Examples
///
/// ```
/// use s3fs_core::path::dir_prefix;
///
/// assert_eq!(dir_prefix("a/b"), "a/b/");
/// assert_eq!(dir_prefix("a/b/"), "a/b/");
/// ```
#[must_use]
pub fn dir_prefix(key: &str) -> String {
    if key.ends_with(SEPARATOR) {
        key.to_owned()
    } else {
        format!("{key}{SEPARATOR}")
    }
}

/// Whether a key denotes a directory (has a trailing separator).
#[must_use]
pub fn is_dir_key(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}

/// Last path segment of a key, ignoring a trailing separator.
///
/// # Examples
///
/// ```
/// use s3fs_core::path::base_name;
///
/// assert_eq!(base_name("a/b/c.txt"), "c.txt");
/// assert_eq!(base_name("a/b/"), "b");
/// assert_eq!(base_name("top"), "top");
/// ```
#[must_use]
pub fn base_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches(SEPARATOR);
    trimmed
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or(trimmed)
}

/// Every directory level of `key`, shallowest first, each with a trailing
/// separator. Empty segments (`a//b`) are skipped.
///
/// # Examples
///
/// ```
/// use s3fs_core::path::dir_levels;
///
/// assert_eq!(dir_levels("a/b/c"), vec!["a/", "a/b/", "a/b/c/"]);
/// assert!(dir_levels("").is_empty());
/// ```
#[must_use]
pub fn dir_levels(key: &str) -> Vec<String> {
    let mut levels = Vec::new();
    let mut current = String::new();
    for segment in key.split(SEPARATOR).filter(|s| !s.is_empty()) {
        current.push_str(segment);
        current.push(SEPARATOR);
        levels.push(current.clone());
    }
    levels
}

/// Validate a normalized key for use as an object key.
///
/// # Errors
///
/// Returns [`FsError::InvalidKey`] if the key is empty or longer than
/// 1024 bytes.
pub fn validate_key(key: &str) -> FsResult<()> {
    if key.is_empty() {
        return Err(FsError::InvalidKey {
            key: key.to_owned(),
            reason: "key must not be empty",
        });
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(FsError::InvalidKey {
            key: key.to_owned(),
            reason: "key is longer than 1024 bytes",
        });
    }
    Ok(())
}
