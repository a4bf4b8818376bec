//! Services operating on the taxonomy through the store traits.
//!
//! Each service is constructed once with the shared [`crate::config::CoreConfig`] and the
//! [`crate::stores::Stores`] bundle, and is cheap to share behind an `Arc`.

pub mod documents;
pub mod health;
pub mod provision;
pub mod transfer;
pub mod upload;

use crate::records::to_row;
use crate::stores::MetadataStore;
use serde::Serialize;

/// Inserts an audit or cache row without letting a failure reach the caller.
///
/// These rows are side channels: losing one is logged and otherwise ignored.
pub(crate) async fn record_best_effort<T: Serialize>(
    metadata: &dyn MetadataStore,
    table: &str,
    record: &T,
) -> Option<i64> {
    let row = match to_row(record) {
        Ok(row) => row,
        Err(e) => {
            tracing::warn!(table, error = %e, "failed to convert best-effort record");
            return None;
        }
    };

    match metadata.insert(table, row).await {
        Ok(stored) => stored.get("id").and_then(serde_json::Value::as_i64),
        Err(e) => {
            tracing::warn!(table, error = %e, "best-effort insert failed");
            None
        }
    }
}
