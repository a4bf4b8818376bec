//! Constants used throughout the Altus core crate.
//!
//! Defaults for [`crate::config::CoreConfig`] and the taxonomy version live here so the
//! values are defined once.

/// Default object-store folder under which the whole taxonomy lives.
pub const DEFAULT_TAXONOMY_ROOT: &str = "/Altus_Empire_Command_Center";

/// Version of the folder taxonomy implemented by [`crate::paths`].
///
/// Bump this whenever a container name or standard subfolder list changes, since
/// previously provisioned paths will no longer match.
pub const TAXONOMY_VERSION: u32 = 2;

/// Payloads at or below this size are uploaded in one request.
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 100 * 1024 * 1024; // 100 MiB

/// Chunk size for session uploads.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024; // 8 MiB

/// Largest chunk the object store accepts in a single request.
pub const MAX_CHUNK_SIZE: u64 = 150 * 1024 * 1024; // 150 MiB

/// Rows fetched per page while relinking file assets during a transfer.
pub const DEFAULT_RELINK_PAGE_SIZE: u32 = 1000;

/// Upper bound for a relink page; the metadata store caps responses at this size.
pub const MAX_RELINK_PAGE_SIZE: u32 = 1000;

/// Idle time after which an unfinished upload session is abandoned.
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 60 * 60;

/// Recorded as `uploaded_by` when the caller does not name an uploader.
pub const DEFAULT_UPLOADER: &str = "api";

/// Slug used for absent names and names with no usable characters.
pub const SLUG_SENTINEL: &str = "unnamed";
