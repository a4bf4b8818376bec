//! # Altus Remote
//!
//! Production implementations of the core store traits:
//! - [`DropboxStore`]: the document tree, as an [`altus_core::ObjectStore`]
//! - [`PostgrestStore`]: file asset, ownership and audit tables, as an
//!   [`altus_core::MetadataStore`]
//!
//! Both are plain HTTP clients built on `reqwest`. Credentials are resolved from raw
//! environment values once at startup; a missing value is a [`RemoteError`].

pub mod dropbox;
pub mod error;
pub mod postgrest;

pub use dropbox::{DropboxCredentials, DropboxStore};
pub use error::{RemoteError, RemoteResult};
pub use postgrest::{PostgrestConfig, PostgrestStore};

/// Trims a raw setting and rejects it when unset or blank.
pub(crate) fn required(name: &'static str, value: Option<String>) -> RemoteResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RemoteError::MissingCredential(name)),
    }
}
