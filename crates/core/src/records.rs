//! Typed metadata rows.
//!
//! The metadata store is addressed by table name with untyped rows. This module holds the
//! table names and the record types the services read and write, so a column name is spelled
//! once.

use crate::stores::Row;
use crate::{AltusError, AltusResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ============================================================================
// TABLES
// ============================================================================

pub const FILE_ASSETS: &str = "file_assets";
pub const OWNERSHIP_PERIODS: &str = "property_ownership_periods";
pub const TRANSFER_AUDIT: &str = "property_transfer_audit";
pub const SYNC_AUDIT: &str = "file_sync_audit";
pub const UPLOAD_IDEMPOTENCY: &str = "upload_idempotency";

// ============================================================================
// RECORDS
// ============================================================================

/// One uploaded document.
///
/// Created once per successful upload. `stored_path` changes only when the owning property
/// is transferred; rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub original_filename: String,
    pub stored_filename: String,
    pub stored_path: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Period during which an owner held a property. `end_date` is `None` while open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipLeg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub property_id: i64,
    pub owner_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Immutable record of one transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAudit {
    pub property_id: i64,
    pub from_owner_id: i64,
    pub to_owner_id: i64,
    pub cutoff_date: NaiveDate,
    pub old_path: String,
    pub new_path: String,
    pub moved: bool,
    pub assets_relinked: u64,
    pub assets_failed: u64,
    pub errors: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of one provisioning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAudit {
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub base_path: String,
    pub paths_touched: u64,
    pub newly_created: u64,
    pub status: String,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Cached response for an upload request carrying an idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub idempotency_key: String,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// ROW CONVERSION
// ============================================================================

/// Serialises a record into a metadata row.
pub fn to_row<T: Serialize>(record: &T) -> AltusResult<Row> {
    match serde_json::to_value(record).map_err(AltusError::Record)? {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(AltusError::InvalidInput(format!(
            "record did not serialise to an object: {other}"
        ))),
    }
}

/// Deserialises a metadata row into a record.
pub fn from_row<T: DeserializeOwned>(row: Row) -> AltusResult<T> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(AltusError::Record)
}
