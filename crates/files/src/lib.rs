//! Altus File Handling
//!
//! This crate holds the byte-level concerns of document uploads, independent of where the
//! bytes end up:
//!
//! - [`PayloadDigest`] / [`PayloadHasher`]: SHA-256 content hash, size and best-effort media
//!   type of a payload, whole or chunk by chunk
//! - [`safe_filename`] / [`stamped_filename`]: the stored filename rules
//! - [`ChunkPlan`]: splitting a payload into contiguous, ordered upload chunks
//!
//! Nothing here performs I/O. Remote storage lives behind the object store trait in
//! `altus-core`.
//!
//! ## Example Usage
//!
//! ```
//! use altus_files::{stamped_filename, ChunkPlan, PayloadDigest};
//! use chrono::{TimeZone, Utc};
//!
//! let digest = PayloadDigest::compute(b"lease agreement");
//! assert_eq!(digest.size_bytes, 15);
//!
//! let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
//! assert_eq!(stamped_filename("Signed Lease.pdf", at), "20240301-093000__Signed_Lease.pdf");
//!
//! let plan = ChunkPlan::new(10, 4).unwrap();
//! assert_eq!(plan.len(), 3);
//! ```

mod chunks;
mod digest;
mod naming;

pub use chunks::ChunkPlan;
pub use digest::{PayloadDigest, PayloadHasher, HASH_ALGORITHM};
pub use naming::{safe_filename, stamped_filename, FALLBACK_FILENAME};

/// Errors that can occur while preparing a payload for upload
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Chunk size must be at least one byte
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(u64),
}
