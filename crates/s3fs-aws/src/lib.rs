//! [`ObjectStore`] implementation backed by Amazon S3 or any S3-compatible
//! service (MinIO, LocalStack, ...).
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use s3fs_aws::S3Store;
//! use s3fs_core::{FileSystem, FsConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = FsConfig::from_env();
//! let store = S3Store::from_config(&config).await;
//! let fs = FileSystem::with_config(Arc::new(store), config);
//!
//! let mut file = fs.create("reports/2024.csv")?;
//! file.write_str("year,total\n2024,42\n")?;
//! file.close().await?;
//! # Ok(())
//! # }
//! ```

use std::error::Error as StdError;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, trace};

use s3fs_core::{
    CompletedPart, FsConfig, ListPage, ObjectMeta, ObjectReader, ObjectStore, StoreError,
    StoreResult,
};

/// Characters left unescaped in a copy source: RFC 3986 unreserved plus `/`.
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// An S3 bucket as an [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from `config`: default credential chain, the
    /// configured region, and optionally a custom endpoint and path-style
    /// addressing.
    pub async fn from_config(config: &FsConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint_url,
            "created S3 client"
        );
        Self::new(Client::from_conf(builder.build()), config.bucket.clone())
    }

    /// The bucket this store is bound to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, key: &str) -> StoreResult<ObjectReader> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, None))?;
        let reader: ObjectReader = Box::pin(output.body.into_async_read());
        Ok(reader)
    }

    async fn get_from(&self, key: &str, offset: u64) -> StoreResult<ObjectReader> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(range_header(offset, u64::MAX))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, None))?;
        let reader: ObjectReader = Box::pin(output.body.into_async_read());
        Ok(reader)
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        if end <= start {
            return Err(StoreError::InvalidRange);
        }
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(range_header(start, end))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, None))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Other(anyhow::Error::new(e)))?;
        Ok(data.into_bytes())
    }

    async fn put(&self, key: &str, body: Bytes) -> StoreResult<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, None))?;
        trace!(key, size, "put object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, None))?;
        Ok(())
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, None))?;
        Ok(ObjectMeta {
            key: key.to_owned(),
            size: to_size(output.content_length()),
            last_modified: to_chrono(output.last_modified()),
            etag: output.e_tag().map(ToOwned::to_owned),
        })
    }

    async fn list(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: Option<usize>,
    ) -> StoreResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token.map(ToOwned::to_owned))
            .set_max_keys(max_keys.map(|n| i32::try_from(n).unwrap_or(i32::MAX)))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, prefix, None))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(ObjectMeta {
                    key: key.to_owned(),
                    size: to_size(object.size()),
                    last_modified: to_chrono(object.last_modified()),
                    etag: object.e_tag().map(ToOwned::to_owned),
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            is_truncated: output.is_truncated().unwrap_or(false),
            next_continuation_token: output.next_continuation_token().map(ToOwned::to_owned),
        })
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source(&self.bucket, src_key))
            .key(dst_key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, src_key, None))?;
        Ok(())
    }

    async fn start_multipart(&self, key: &str) -> StoreResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, None))?;
        output
            .upload_id()
            .map(ToOwned::to_owned)
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("response carried no upload id")))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> StoreResult<String> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(to_part_number(part_number)?)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, Some(upload_id)))?;
        output
            .e_tag()
            .map(ToOwned::to_owned)
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("response carried no part etag")))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        let completed = parts
            .iter()
            .map(|p| {
                Ok(S3CompletedPart::builder()
                    .part_number(to_part_number(p.part_number)?)
                    .e_tag(&p.etag)
                    .build())
            })
            .collect::<StoreResult<Vec<_>>>()?;

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, Some(upload_id)))?;
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key, Some(upload_id)))?;
        Ok(())
    }
}

/// Store-level classification of an S3 failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKind {
    NotFound,
    NoSuchUpload,
    InvalidPart,
    InvalidPartOrder,
    InvalidRange,
}

fn classify(code: Option<&str>, status: Option<u16>) -> Option<ErrorKind> {
    match code {
        Some("NoSuchKey" | "NotFound") => return Some(ErrorKind::NotFound),
        Some("NoSuchUpload") => return Some(ErrorKind::NoSuchUpload),
        Some("InvalidPart") => return Some(ErrorKind::InvalidPart),
        Some("InvalidPartOrder") => return Some(ErrorKind::InvalidPartOrder),
        Some("InvalidRange") => return Some(ErrorKind::InvalidRange),
        _ => {}
    }
    match status {
        Some(404) => Some(ErrorKind::NotFound),
        Some(416) => Some(ErrorKind::InvalidRange),
        _ => None,
    }
}

fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, key: &str, upload_id: Option<&str>) -> StoreError
where
    E: ProvideErrorMetadata + StdError + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    match (classify(err.code(), status), upload_id) {
        // A 404 during a multipart call means the upload is gone.
        (Some(ErrorKind::NotFound | ErrorKind::NoSuchUpload), Some(upload_id)) => {
            StoreError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            }
        }
        (Some(ErrorKind::NotFound | ErrorKind::NoSuchUpload), None) => StoreError::NotFound {
            key: key.to_owned(),
        },
        (Some(ErrorKind::InvalidPart), _) => StoreError::InvalidPart,
        (Some(ErrorKind::InvalidPartOrder), _) => StoreError::InvalidPartOrder,
        (Some(ErrorKind::InvalidRange), _) => StoreError::InvalidRange,
        (None, _) => StoreError::Other(anyhow::anyhow!("{}", DisplayErrorContext(&err))),
    }
}

/// HTTP `Range` header for the half-open range `[start, end)`.
fn range_header(start: u64, end: u64) -> String {
    if end == u64::MAX {
        format!("bytes={start}-")
    } else {
        format!("bytes={start}-{}", end - 1)
    }
}

fn copy_source(bucket: &str, key: &str) -> String {
    utf8_percent_encode(&format!("{bucket}/{key}"), COPY_SOURCE_ENCODE_SET).to_string()
}

fn to_part_number(part_number: u32) -> StoreResult<i32> {
    i32::try_from(part_number).map_err(|_| StoreError::InvalidArgument {
        message: format!("part number {part_number} is out of range"),
    })
}

fn to_size(length: Option<i64>) -> u64 {
    length.and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

fn to_chrono(timestamp: Option<&SmithyDateTime>) -> DateTime<Utc> {
    timestamp
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_default()
}
