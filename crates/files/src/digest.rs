//! Content digests for uploaded payloads.
//!
//! Every stored document is described by the SHA-256 digest of its bytes. The digest is
//! recorded on the file asset row so a document can be verified against the object store
//! copy later, and so duplicate uploads are detectable without downloading anything.

use sha2::{Digest, Sha256};

/// Hashing algorithm used for every digest produced by this crate.
pub const HASH_ALGORITHM: &str = "sha256";

// Enough leading bytes for `infer` to recognise every format it supports.
const SNIFF_LEN: usize = 8 * 1024;

/// Digest and size information for a payload
///
/// `media_type` is sniffed from magic bytes and is best-effort only. It is `None` for
/// plain text and for formats `infer` does not recognise.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct PayloadDigest {
    /// Hashing algorithm (always "sha256")
    pub hash_algorithm: String,

    /// Lowercase hexadecimal SHA-256 of the payload
    pub content_hash: String,

    /// Payload length in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    pub media_type: Option<String>,
}

impl PayloadDigest {
    /// Computes the digest of a complete payload.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = PayloadHasher::new();
        hasher.update(bytes);
        hasher.finish()
    }
}

/// Incremental digest over a payload that arrives in chunks
///
/// Feeding the chunks of a payload in order produces the same [`PayloadDigest`] as
/// [`PayloadDigest::compute`] over the concatenated bytes.
#[derive(Debug, Clone, Default)]
pub struct PayloadHasher {
    hasher: Sha256,
    size_bytes: u64,
    head: Vec<u8>,
}

impl PayloadHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next chunk of the payload.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.size_bytes += chunk.len() as u64;

        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }
    }

    /// Bytes fed so far.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn finish(self) -> PayloadDigest {
        let media_type = infer::get(&self.head).map(|kind| kind.mime_type().to_string());

        PayloadDigest {
            hash_algorithm: HASH_ALGORITHM.to_string(),
            content_hash: hex::encode(self.hasher.finalize()),
            size_bytes: self.size_bytes,
            media_type,
        }
    }
}
