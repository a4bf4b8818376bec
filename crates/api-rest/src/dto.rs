//! Request and response bodies of the REST API.
//!
//! These mirror the core types with OpenAPI schemas attached. Entities travel as
//! `{entity_type, attributes}`; the attribute shape depends on the entity type and is
//! documented as a free-form object.

use altus_core::{
    AssetLink, BulkTransferRequest, Entity, EntityKind, EntityRef, HealthReport, TransferReport,
    TransferRequest, UploadCursor, UploadReceipt,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub object_store: String,
    pub metadata_store: String,
}

impl From<HealthReport> for HealthRes {
    fn from(report: HealthReport) -> Self {
        Self {
            ok: report.ok,
            object_store: report.object_store.detail,
            metadata_store: report.metadata_store.detail,
        }
    }
}

/// An entity in the taxonomy, e.g.
/// `{"entity_type": "property", "attributes": {"owner": {"id": 1, "name": "Acme"},
/// "property": {"id": 7, "name": "Sunset"}}}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntityBody {
    #[schema(value_type = String, example = "property")]
    pub entity_type: EntityKind,
    #[schema(value_type = Object)]
    pub attributes: serde_json::Value,
}

impl EntityBody {
    /// Parses the attributes against the entity type.
    pub fn into_entity(self) -> Result<Entity, String> {
        serde_json::from_value(serde_json::json!({
            "entity_type": self.entity_type,
            "attributes": self.attributes,
        }))
        .map_err(|e| format!("invalid {} attributes: {e}", self.entity_type))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntityRefBody {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<EntityRefBody> for EntityRef {
    fn from(body: EntityRefBody) -> Self {
        EntityRef {
            id: body.id,
            name: body.name,
        }
    }
}

// ============================================================================
// PATHS AND PROVISIONING
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolvePathsReq {
    #[serde(flatten)]
    pub entity: EntityBody,
    /// Also resolve the folder a document of this kind is filed in.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "lease_signed")]
    pub document_kind: Option<altus_core::DocumentKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolvePathsRes {
    pub entity_type: String,
    pub base_path: String,
    pub subfolders: Vec<String>,
    pub document_folder: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProvisionReq {
    #[serde(flatten)]
    pub entity: EntityBody,
    /// Provision every ancestor first, owner downwards.
    #[serde(default)]
    pub include_ancestors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProvisionRes {
    pub base_path: String,
    /// Base followed by every standard subfolder of the requested entity.
    pub paths: Vec<String>,
    /// Folders created by this call, ancestors included.
    pub created_paths: Vec<String>,
}

// ============================================================================
// UPLOADS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadReq {
    #[schema(value_type = String, example = "lease_signed")]
    pub document_kind: altus_core::DocumentKind,
    pub entity: EntityBody,
    pub original_filename: String,
    /// File content, standard base64.
    pub file_base64: String,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadRes {
    pub stored_path: String,
    pub stored_filename: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub media_type: Option<String>,
    pub revision: Option<String>,
    pub asset_id: Option<i64>,
    pub replayed: bool,
}

impl From<UploadReceipt> for UploadRes {
    fn from(receipt: UploadReceipt) -> Self {
        Self {
            stored_path: receipt.stored_path,
            stored_filename: receipt.stored_filename,
            size_bytes: receipt.size_bytes,
            content_hash: receipt.content_hash,
            media_type: receipt.media_type,
            revision: receipt.revision,
            asset_id: receipt.asset_id,
            replayed: receipt.replayed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartSessionReq {
    #[schema(value_type = String, example = "property_photo")]
    pub document_kind: altus_core::DocumentKind,
    pub entity: EntityBody,
    pub original_filename: String,
    pub chunk_base64: String,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppendSessionReq {
    pub session_id: String,
    /// Bytes already received by the session.
    pub offset: u64,
    pub chunk_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinishSessionReq {
    pub session_id: String,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionCursorRes {
    pub session_id: String,
    pub offset: u64,
}

impl From<UploadCursor> for SessionCursorRes {
    fn from(cursor: UploadCursor) -> Self {
        Self {
            session_id: cursor.session_id,
            offset: cursor.offset,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetLinkRes {
    pub asset_id: i64,
    pub stored_path: String,
    pub link: String,
}

impl From<AssetLink> for AssetLinkRes {
    fn from(link: AssetLink) -> Self {
        Self {
            asset_id: link.asset_id,
            stored_path: link.stored_path,
            link: link.link,
        }
    }
}

// ============================================================================
// TRANSFERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferReq {
    pub property: EntityRefBody,
    pub from_owner: EntityRefBody,
    pub to_owner: EntityRefBody,
    #[schema(value_type = String, example = "2025-01-01")]
    pub cutoff_date: NaiveDate,
    #[serde(default)]
    pub leave_marker: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl From<TransferReq> for TransferRequest {
    fn from(req: TransferReq) -> Self {
        TransferRequest {
            property: req.property.into(),
            from_owner: req.from_owner.into(),
            to_owner: req.to_owner.into(),
            cutoff_date: req.cutoff_date,
            leave_marker: req.leave_marker,
            dry_run: req.dry_run,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkTransferReq {
    pub from_owner: EntityRefBody,
    pub to_owner: EntityRefBody,
    pub properties: Vec<EntityRefBody>,
    #[schema(value_type = String, example = "2025-01-01")]
    pub cutoff_date: NaiveDate,
    #[serde(default)]
    pub leave_marker: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl From<BulkTransferReq> for BulkTransferRequest {
    fn from(req: BulkTransferReq) -> Self {
        BulkTransferRequest {
            from_owner: req.from_owner.into(),
            to_owner: req.to_owner.into(),
            properties: req.properties.into_iter().map(Into::into).collect(),
            cutoff_date: req.cutoff_date,
            leave_marker: req.leave_marker,
            dry_run: req.dry_run,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StepErrorRes {
    pub step: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferRes {
    pub property_id: i64,
    pub moved: bool,
    pub old_path: String,
    pub new_path: String,
    pub assets_relinked: u64,
    pub assets_failed: u64,
    pub legs_closed: u64,
    pub leg_opened: bool,
    pub marker_path: Option<String>,
    pub dry_run: bool,
    pub errors: Vec<StepErrorRes>,
}

impl From<TransferReport> for TransferRes {
    fn from(report: TransferReport) -> Self {
        Self {
            property_id: report.property_id,
            moved: report.moved,
            old_path: report.old_path,
            new_path: report.new_path,
            assets_relinked: report.assets_relinked,
            assets_failed: report.assets_failed,
            legs_closed: report.legs_closed,
            leg_opened: report.leg_opened,
            marker_path: report.marker_path,
            dry_run: report.dry_run,
            errors: report
                .errors
                .into_iter()
                .map(|e| StepErrorRes {
                    step: e.step.to_string(),
                    message: e.message,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkTransferRes {
    pub reports: Vec<TransferRes>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
    /// Folder whose creation failed, for a provisioning run that stopped part way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_path: Option<String>,
    /// Folders already ensured before a provisioning run stopped. Nothing is rolled back.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub touched: Vec<String>,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            failed_path: None,
            touched: Vec::new(),
        }
    }
}
