//! Integration tests for s3fs against a running S3-compatible server.
//!
//! These tests require a server (LocalStack, MinIO, ...) at
//! `localhost:4566`, or wherever `S3FS_ENDPOINT_URL` points. They are marked
//! `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p s3fs-integration -- --ignored
//! ```

use std::sync::{Arc, Once};

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use s3fs_aws::S3Store;
use s3fs_core::{FileSystem, FsConfig};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize tracing (once).
///
/// `RUST_LOG` wins when set; otherwise the filter comes from `LOG_LEVEL`.
fn init_tracing() {
    INIT.call_once(|| {
        let config = FsConfig::from_env();
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter(&config)),
            )
            .with_test_writer()
            .init();
    });
}

/// Build a tracing filter from the configured log level, falling back to `warn`.
fn log_filter(config: &FsConfig) -> EnvFilter {
    EnvFilter::try_new(&config.log_level).unwrap_or_else(|e| {
        eprintln!("invalid LOG_LEVEL {:?}: {e}", config.log_level);
        EnvFilter::new("warn")
    })
}

/// Endpoint URL for the server.
fn endpoint_url() -> String {
    FsConfig::from_env()
        .endpoint_url
        .unwrap_or_else(|| "http://localhost:4566".to_owned())
}

/// Create a configured S3 client pointing at the local server.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Create a bucket and return its name. Caller is responsible for cleanup.
pub async fn create_test_bucket(client: &aws_sdk_s3::Client, prefix: &str) -> String {
    let name = test_bucket_name(prefix);
    client
        .create_bucket()
        .bucket(&name)
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    tracing::debug!(bucket = %name, "created test bucket");
    name
}

/// A filesystem over `bucket`.
#[must_use]
pub fn test_fs(client: &aws_sdk_s3::Client, bucket: &str) -> FileSystem {
    FileSystem::new(Arc::new(S3Store::new(client.clone(), bucket)))
}

/// Delete all objects and pending uploads in a bucket, then the bucket.
pub async fn cleanup_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    let mut continuation_token = None;
    loop {
        let mut req = client.list_objects_v2().bucket(bucket);
        if let Some(token) = continuation_token.take() {
            req = req.continuation_token(token);
        }
        let Ok(resp) = req.send().await else {
            return; // Bucket may not exist.
        };

        for obj in resp.contents() {
            if let Some(key) = obj.key() {
                let _ = client.delete_object().bucket(bucket).key(key).send().await;
            }
        }

        if resp.is_truncated() == Some(true) {
            continuation_token = resp.next_continuation_token().map(ToOwned::to_owned);
        } else {
            break;
        }
    }

    if let Ok(uploads) = client.list_multipart_uploads().bucket(bucket).send().await {
        for upload in uploads.uploads() {
            if let (Some(key), Some(id)) = (upload.key(), upload.upload_id()) {
                let _ = client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(id)
                    .send()
                    .await;
            }
        }
    }

    let _ = client.delete_bucket().bucket(bucket).send().await;
}

mod test_handle;
mod test_multipart;
mod test_tree;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_filter_from_log_level() {
        let config = FsConfig::builder().log_level("debug".to_owned()).build();
        assert_eq!(log_filter(&config).to_string(), "debug");
    }

    #[test]
    fn test_should_fall_back_to_warn_for_bad_log_level() {
        let config = FsConfig::builder().log_level("s3fs=loud".to_owned()).build();
        assert_eq!(log_filter(&config).to_string(), "warn");
    }
}
