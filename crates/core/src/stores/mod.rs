//! External storage seams.
//!
//! The core talks to two remote systems and knows them only through these traits:
//!
//! - [`ObjectStore`]: the hierarchical document store (folders, files, upload sessions).
//! - [`MetadataStore`]: the relational store holding file asset rows, ownership legs and
//!   audit rows, addressed by table name with simple filters.
//!
//! Production implementations live in the `altus-remote` crate. The in-memory
//! implementations in [`memory`] back local development and every test in the workspace.

pub mod memory;

use crate::error::StoreResult;
use crate::paths::StorePath;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

pub use memory::{InMemoryMetadataStore, InMemoryObjectStore};

// ============================================================================
// OBJECT STORE
// ============================================================================

/// A stored file as reported by the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    pub id: Option<String>,
    pub revision: Option<String>,
    pub size: u64,
    /// Store-specific content hash, if the store computes one.
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub path: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum RemoteEntry {
    File(RemoteFile),
    Folder(RemoteFolder),
}

impl RemoteEntry {
    pub fn path(&self) -> &str {
        match self {
            RemoteEntry::File(file) => &file.path,
            RemoteEntry::Folder(folder) => &folder.path,
        }
    }
}

/// Account the object store credentials belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub account_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// What a write does when a file already exists at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the existing file.
    Overwrite,
    /// Keep the existing file and store the new one under a free name such as `a (1).pdf`.
    /// The returned [`RemoteFile::path`] is where the bytes actually landed.
    Add,
}

/// Hierarchical object store.
///
/// Error contract, relied on by the services:
/// - `create_folder` on an existing path fails with [`crate::StoreError::Conflict`], and with
///   [`crate::StoreError::NotFound`] when the parent folder is missing.
/// - `move_path` fails with `Conflict` when the destination exists and `NotFound` when the
///   source is missing.
/// - `upload` and `upload_session_finish` follow their [`WriteMode`] when a file already
///   exists at the destination.
/// - `upload_session_append`/`_finish` fail with [`crate::StoreError::IncorrectOffset`] when
///   `offset` is not the number of bytes the session has received.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_folder(&self, path: &StorePath) -> StoreResult<RemoteFolder>;

    async fn move_path(&self, from: &StorePath, to: &StorePath) -> StoreResult<RemoteEntry>;

    async fn upload(
        &self,
        path: &StorePath,
        bytes: &[u8],
        mode: WriteMode,
    ) -> StoreResult<RemoteFile>;

    /// Opens an upload session with its first chunk and returns the session id.
    async fn upload_session_start(&self, first_chunk: &[u8]) -> StoreResult<String>;

    async fn upload_session_append(
        &self,
        session_id: &str,
        offset: u64,
        chunk: &[u8],
    ) -> StoreResult<()>;

    async fn upload_session_finish(
        &self,
        session_id: &str,
        offset: u64,
        path: &StorePath,
        mode: WriteMode,
    ) -> StoreResult<RemoteFile>;

    /// Short-lived direct download link for a file.
    async fn temporary_link(&self, path: &StorePath) -> StoreResult<String>;

    /// Metadata for a path, or `None` if nothing exists there.
    async fn metadata(&self, path: &StorePath) -> StoreResult<Option<RemoteEntry>>;

    async fn account_identity(&self) -> StoreResult<AccountIdentity>;
}

// ============================================================================
// METADATA STORE
// ============================================================================

/// One row of a metadata table.
pub type Row = serde_json::Map<String, Value>;

/// Row filter understood by every metadata store.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    IsNull(String),
    /// String column starts with the given literal prefix, ignoring case.
    StartsWith(String, String),
    Gt(String, Value),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _)
            | Filter::IsNull(column)
            | Filter::StartsWith(column, _)
            | Filter::Gt(column, _) => column,
        }
    }

    /// Evaluates the filter against a row held in memory.
    pub fn matches(&self, row: &Row) -> bool {
        let value = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, expected) => compare_values(value, expected) == Some(Ordering::Equal),
            Filter::IsNull(_) => value.is_null(),
            Filter::StartsWith(_, prefix) => value
                .as_str()
                .is_some_and(|s| s.to_lowercase().starts_with(&prefix.to_lowercase())),
            Filter::Gt(_, bound) => compare_values(value, bound) == Some(Ordering::Greater),
        }
    }
}

/// Orders two JSON scalars of the same type; `None` when they are not comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Select query: conjunction of filters, optional ascending order and row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.into()));
        self
    }

    pub fn starts_with(mut self, column: &str, prefix: impl Into<String>) -> Self {
        self.filters
            .push(Filter::StartsWith(column.into(), prefix.into()));
        self
    }

    pub fn gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gt(column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Table-oriented metadata store.
///
/// There are no cross-row transactions: every call is applied on its own.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Row>>;

    /// Inserts a row and returns it as stored (including any generated `id`).
    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row>;

    /// Merges `fields` into every row matching `filters`; returns how many rows changed.
    async fn patch(&self, table: &str, filters: &[Filter], fields: Row) -> StoreResult<usize>;
}

/// The pair of stores every service works against.
#[derive(Clone)]
pub struct Stores {
    pub objects: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl Stores {
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { objects, metadata }
    }

    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryMetadataStore::new()),
        )
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filters_match_rows() {
        let r = row(json!({"id": 5, "stored_path": "/A/P-1/x.pdf", "end_date": null}));

        assert!(Filter::Eq("id".into(), json!(5)).matches(&r));
        assert!(!Filter::Eq("id".into(), json!(6)).matches(&r));
        assert!(Filter::IsNull("end_date".into()).matches(&r));
        assert!(Filter::IsNull("missing".into()).matches(&r));
        assert!(Filter::StartsWith("stored_path".into(), "/A/P-1/".into()).matches(&r));
        assert!(!Filter::StartsWith("stored_path".into(), "/A/P-10/".into()).matches(&r));
        assert!(Filter::StartsWith("stored_path".into(), "/a/p-1/".into()).matches(&r));
        assert!(Filter::Gt("id".into(), json!(4)).matches(&r));
        assert!(!Filter::Gt("id".into(), json!(5)).matches(&r));
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new().eq("owner_id", 1).is_null("end_date").order_by("id").limit(10);
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.order_by.as_deref(), Some("id"));
        assert_eq!(query.limit, Some(10));
    }
}
