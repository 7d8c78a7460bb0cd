//! Entity tags for stored objects.
//!
//! A whole object's tag is the quoted hex MD5 of its body. An object
//! assembled from parts is tagged with the MD5 of the concatenated binary
//! part digests and a `-<parts>` suffix, so clients can tell the two apart.

use std::fmt;

use digest::Digest;
use md5::Md5;

/// Quoted hex MD5 of `body`.
///
/// ```
/// use s3fs_core::checksums::object_etag;
///
/// assert_eq!(object_etag(b""), "\"d41d8cd98f00b204e9800998ecf8427e\"");
/// ```
#[must_use]
pub fn object_etag(body: &[u8]) -> String {
    format!("\"{}\"", hex::encode(<Md5 as Digest>::digest(body)))
}

/// Running tag of an object assembled from parts, fed one part body at a
/// time in manifest order.
#[derive(Default)]
pub struct MultipartEtag {
    digests: Md5,
    parts: usize,
}

impl MultipartEtag {
    /// Fold in the next part.
    pub fn push(&mut self, part_body: &[u8]) {
        let digest = <Md5 as Digest>::digest(part_body);
        Digest::update(&mut self.digests, &digest[..]);
        self.parts += 1;
    }

    /// Number of parts folded in so far.
    #[must_use]
    pub fn parts(&self) -> usize {
        self.parts
    }

    /// The final quoted tag.
    #[must_use]
    pub fn finish(self) -> String {
        format!("\"{}-{}\"", hex::encode(self.digests.finalize()), self.parts)
    }
}

impl fmt::Debug for MultipartEtag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartEtag")
            .field("parts", &self.parts)
            .finish_non_exhaustive()
    }
}
