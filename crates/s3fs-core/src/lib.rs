//! Hierarchical, POSIX-like filesystem emulation on top of a flat object store.
//!
//! The object store only knows how to get, put, delete, head, copy and list
//! objects by prefix, plus multipart uploads. This crate layers file and
//! directory verbs on top of that:
//!
//! - [`Handle`] -- one open file, either streaming reads or buffering writes
//!   in memory until [`Handle::close`] uploads the whole object.
//! - [`tree`] -- directory semantics synthesized from prefix listings:
//!   existence, recursive create, recursive delete and tree walks.
//! - [`MultipartUpload`] -- the chunked upload session for payloads too large
//!   to buffer.
//! - [`FileSystem`] -- the facade tying the above to one injected
//!   [`ObjectStore`].
//!
//! # Architecture
//!
//! ```text
//!   FileSystem (open / mkdir / remove / rename / walk / stat)
//!        |
//!        +------------+---------------+
//!        v            v               v
//!     Handle     tree operations  MultipartUpload
//!        |            |               |
//!        +------------+---------------+
//!                     v
//!          Arc<dyn ObjectStore>  (InMemoryStore, S3Store, ...)
//! ```
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use s3fs_core::{FileSystem, InMemoryStore};
//!
//! # tokio_test::block_on(async {
//! let fs = FileSystem::new(Arc::new(InMemoryStore::default()));
//!
//! let mut file = fs.create("docs/readme.txt").unwrap();
//! file.write(b"hello").unwrap();
//! file.close().await.unwrap();
//!
//! assert!(fs.exists("docs/readme.txt").await);
//! assert!(fs.is_dir("docs").await.unwrap());
//! # });
//! ```

pub mod checksums;
pub mod config;
pub mod error;
pub mod fs;
pub mod handle;
pub mod memory;
pub mod multipart;
pub mod path;
pub mod store;
#[cfg(test)]
mod testing;
pub mod tree;

pub use config::FsConfig;
pub use error::{FsError, FsResult, StoreError, StoreResult};
pub use fs::FileSystem;
pub use handle::{Handle, OpenMode};
pub use memory::InMemoryStore;
pub use multipart::{DEFAULT_PART_SIZE, MIN_PART_SIZE, MultipartUpload, UploadState};
pub use store::{CompletedPart, FileInfo, ListPage, ObjectMeta, ObjectReader, ObjectStore};
