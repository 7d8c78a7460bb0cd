//! Filesystem configuration.
//!
//! Provides [`FsConfig`], shared by the filesystem facade (part size) and the
//! store backends (bucket, region, endpoint). Values are loaded from
//! environment variables via [`FsConfig::from_env`].

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::multipart::{DEFAULT_PART_SIZE, MIN_PART_SIZE};

/// Filesystem configuration.
///
/// # Examples
///
/// ```
/// use s3fs_core::config::FsConfig;
///
/// let config = FsConfig::default();
/// assert_eq!(config.region, "us-east-1");
/// assert_eq!(config.part_size, 10 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct FsConfig {
    /// Bucket holding the emulated filesystem.
    #[builder(default)]
    pub bucket: String,

    /// Region of the bucket.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Custom endpoint for S3-compatible services (MinIO, LocalStack, ...).
    #[builder(default)]
    pub endpoint_url: Option<String>,

    /// Whether to use path-style bucket addressing.
    #[builder(default = false)]
    pub force_path_style: bool,

    /// Default part size for multipart uploads, in bytes.
    #[builder(default = DEFAULT_PART_SIZE)]
    pub part_size: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: String::from("us-east-1"),
            endpoint_url: None,
            force_path_style: false,
            part_size: DEFAULT_PART_SIZE,
            log_level: String::from("info"),
        }
    }
}

impl FsConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `S3FS_BUCKET` | *(empty)* |
    /// | `S3FS_REGION`, then `AWS_REGION` | `us-east-1` |
    /// | `S3FS_ENDPOINT_URL` | *(unset)* |
    /// | `S3FS_FORCE_PATH_STYLE` | `false` |
    /// | `S3FS_PART_SIZE` | `10485760` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// A part size that does not parse or is below [`MIN_PART_SIZE`] is
    /// ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("S3FS_BUCKET") {
            config.bucket = v;
        }
        if let Some(v) = lookup("S3FS_REGION").or_else(|| lookup("AWS_REGION")) {
            config.region = v;
        }
        if let Some(v) = lookup("S3FS_ENDPOINT_URL") {
            if !v.is_empty() {
                config.endpoint_url = Some(v);
            }
        }
        if let Some(v) = lookup("S3FS_FORCE_PATH_STYLE") {
            config.force_path_style = parse_bool(&v);
        }
        if let Some(v) = lookup("S3FS_PART_SIZE") {
            match v.parse::<u64>() {
                Ok(n) if n >= MIN_PART_SIZE => config.part_size = n,
                _ => tracing::warn!(value = %v, "ignoring invalid S3FS_PART_SIZE"),
            }
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
