//! Document uploads into the taxonomy.
//!
//! A document upload:
//! 1. validates the request and replays a cached response for a known idempotency key,
//! 2. routes the document kind to its folder and ensures that folder chain exists,
//! 3. stores the payload under a timestamped filename (single-shot or session upload); a
//!    name already taken in the folder gets a ` (N)` suffix instead of being overwritten,
//! 4. records a `file_assets` row with the payload digest.
//!
//! The asset row and the idempotency cache entry are written best-effort: once the bytes are
//! stored the upload has succeeded, and a failed metadata write is logged and reported as a
//! missing `asset_id`.

use crate::config::CoreConfig;
use crate::entity::Entity;
use crate::paths::{DocumentKind, EntityPaths, StorePath};
use crate::records::{
    from_row, FileAsset, IdempotencyRecord, FILE_ASSETS, UPLOAD_IDEMPOTENCY,
};
use crate::services::provision::FolderProvisioner;
use crate::services::record_best_effort;
use crate::services::upload::{UploadCursor, UploadSessionManager, UploadState};
use crate::stores::{Query, RemoteFile, Stores, WriteMode};
use crate::{AltusError, AltusResult};
use altus_files::{stamped_filename, PayloadDigest, PayloadHasher};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Where a document goes and who is filing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTarget {
    pub document_kind: DocumentKind,
    pub entity: Entity,
    pub original_filename: String,
    /// Defaults to the configured uploader.
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

/// A complete single-request upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub target: DocumentTarget,
    pub bytes: Vec<u8>,
    pub idempotency_key: Option<String>,
}

/// Outcome of a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub stored_path: String,
    pub stored_filename: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub media_type: Option<String>,
    pub revision: Option<String>,
    /// Id of the `file_assets` row, if it could be written.
    pub asset_id: Option<i64>,
    /// True when this receipt was replayed from the idempotency cache.
    #[serde(default)]
    pub replayed: bool,
}

/// Short-lived download link for a stored asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLink {
    pub asset_id: i64,
    pub stored_path: String,
    pub link: String,
}

#[derive(Debug)]
struct PendingDocument {
    target: DocumentTarget,
    folder: StorePath,
    hasher: PayloadHasher,
}

/// Files documents into the taxonomy and records them in the metadata store.
#[derive(Debug)]
pub struct DocumentService {
    cfg: Arc<CoreConfig>,
    stores: Stores,
    provisioner: FolderProvisioner,
    uploads: UploadSessionManager,
    pending: Mutex<HashMap<String, PendingDocument>>,
}

impl DocumentService {
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self {
            provisioner: FolderProvisioner::new(cfg.clone(), stores.clone()),
            uploads: UploadSessionManager::new(cfg.clone(), stores.clone()),
            cfg,
            stores,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The session manager backing chunked document uploads.
    pub fn sessions(&self) -> &UploadSessionManager {
        &self.uploads
    }

    /// Stores a complete payload and records it.
    #[tracing::instrument(skip_all, fields(document_kind = ?request.target.document_kind))]
    pub async fn upload(&self, request: UploadRequest) -> AltusResult<UploadReceipt> {
        let folder = self.validate_target(&request.target)?;

        let key = request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        if let Some(key) = key {
            if let Some(receipt) = self.cached_receipt(key).await {
                tracing::info!(idempotency_key = key, "replaying cached upload response");
                return Ok(receipt);
            }
        }

        self.provisioner.ensure_tree(&folder).await?;

        let uploaded_at = Utc::now();
        let dest = folder.join(&stamped_filename(
            &request.target.original_filename,
            uploaded_at,
        ));
        let digest = PayloadDigest::compute(&request.bytes);

        let remote = self
            .uploads
            .upload(&dest, &request.bytes, WriteMode::Add)
            .await?;
        tracing::info!(path = %remote.path, size = digest.size_bytes, "stored document");

        let receipt = self
            .record_asset(&request.target, &remote, digest, uploaded_at)
            .await;

        if let Some(key) = key {
            let cached = IdempotencyRecord {
                idempotency_key: key.to_string(),
                response: serde_json::to_value(&receipt).map_err(AltusError::Record)?,
                created_at: Utc::now(),
            };
            record_best_effort(self.stores.metadata.as_ref(), UPLOAD_IDEMPOTENCY, &cached).await;
        }

        Ok(receipt)
    }

    /// Opens a chunked document upload with its first chunk.
    ///
    /// The destination folder is ensured now; the filename is stamped when the session
    /// finishes.
    pub async fn start_session(
        &self,
        target: DocumentTarget,
        first_chunk: &[u8],
    ) -> AltusResult<UploadCursor> {
        let folder = self.validate_target(&target)?;
        self.provisioner.ensure_tree(&folder).await?;

        let cursor = self.uploads.start(first_chunk).await?;

        let mut hasher = PayloadHasher::new();
        hasher.update(first_chunk);
        self.pending.lock().insert(
            cursor.session_id.clone(),
            PendingDocument {
                target,
                folder,
                hasher,
            },
        );
        Ok(cursor)
    }

    /// Appends the next chunk of a document session.
    pub async fn append_session(
        &self,
        session_id: &str,
        offset: u64,
        chunk: &[u8],
    ) -> AltusResult<u64> {
        if !self.pending.lock().contains_key(session_id) {
            return Err(AltusError::UnknownSession(session_id.to_string()));
        }

        let next = self.uploads.append(session_id, offset, chunk).await?;

        if let Some(pending) = self.pending.lock().get_mut(session_id) {
            pending.hasher.update(chunk);
        }
        Ok(next)
    }

    /// Commits a document session and records the asset.
    pub async fn finish_session(&self, session_id: &str, offset: u64) -> AltusResult<UploadReceipt> {
        let (folder, original_filename) = {
            let pending = self.pending.lock();
            let doc = pending
                .get(session_id)
                .ok_or_else(|| AltusError::UnknownSession(session_id.to_string()))?;
            (doc.folder.clone(), doc.target.original_filename.clone())
        };

        let uploaded_at = Utc::now();
        let dest = folder.join(&stamped_filename(&original_filename, uploaded_at));

        let remote = self
            .uploads
            .finish(session_id, offset, &dest, WriteMode::Add)
            .await?;

        let Some(doc) = self.pending.lock().remove(session_id) else {
            return Err(AltusError::UnknownSession(session_id.to_string()));
        };
        let digest = doc.hasher.finish();
        tracing::info!(path = %remote.path, size = digest.size_bytes, "stored document from session");

        Ok(self
            .record_asset(&doc.target, &remote, digest, uploaded_at)
            .await)
    }

    /// Abandons idle sessions and drops their pending document state.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let abandoned = self.uploads.sweep_idle(now);

        // The session lock is never taken while holding the pending lock.
        let tracked: Vec<String> = self.pending.lock().keys().cloned().collect();
        let stale: Vec<String> = tracked
            .into_iter()
            .filter(|id| !matches!(self.uploads.state(id), Some(UploadState::Active { .. })))
            .collect();
        if !stale.is_empty() {
            let mut pending = self.pending.lock();
            for id in &stale {
                pending.remove(id);
            }
        }
        abandoned
    }

    /// Temporary download link for a recorded asset.
    pub async fn temporary_link(&self, asset_id: i64) -> AltusResult<AssetLink> {
        let rows = self
            .stores
            .metadata
            .select(FILE_ASSETS, &Query::new().eq("id", asset_id).limit(1))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or(AltusError::AssetNotFound(asset_id))?;
        let asset: FileAsset = from_row(row)?;

        let path = StorePath::parse(&asset.stored_path)?;
        let link = self.stores.objects.temporary_link(&path).await?;
        Ok(AssetLink {
            asset_id,
            stored_path: asset.stored_path,
            link,
        })
    }

    fn validate_target(&self, target: &DocumentTarget) -> AltusResult<StorePath> {
        target.entity.validate()?;
        if target.original_filename.trim().is_empty() {
            return Err(AltusError::InvalidInput(
                "original_filename cannot be empty".into(),
            ));
        }
        EntityPaths::document_folder(
            self.cfg.taxonomy_root(),
            &target.entity,
            target.document_kind,
        )
    }

    async fn cached_receipt(&self, key: &str) -> Option<UploadReceipt> {
        let query = Query::new().eq("idempotency_key", key).limit(1);
        let rows = match self
            .stores
            .metadata
            .select(UPLOAD_IDEMPOTENCY, &query)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "idempotency lookup failed; uploading anyway");
                return None;
            }
        };

        let record: IdempotencyRecord = from_row(rows.into_iter().next()?).ok()?;
        let mut receipt: UploadReceipt = serde_json::from_value(record.response).ok()?;
        receipt.replayed = true;
        Some(receipt)
    }

    // The stored filename is taken from where the bytes landed, which differs from the
    // stamped name when the store renamed the upload.
    async fn record_asset(
        &self,
        target: &DocumentTarget,
        remote: &RemoteFile,
        digest: PayloadDigest,
        uploaded_at: DateTime<Utc>,
    ) -> UploadReceipt {
        let stored_filename = remote.path.rsplit('/').next().unwrap_or_default();
        let asset = FileAsset {
            id: None,
            entity_type: target.entity.kind().to_string(),
            entity_id: target.entity.id(),
            original_filename: target.original_filename.clone(),
            stored_filename: stored_filename.to_string(),
            stored_path: remote.path.clone(),
            content_hash: digest.content_hash.clone(),
            size_bytes: digest.size_bytes,
            media_type: digest.media_type.clone(),
            uploaded_by: target
                .uploaded_by
                .clone()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| self.cfg.uploader().to_string()),
            uploaded_at,
        };
        let asset_id = record_best_effort(self.stores.metadata.as_ref(), FILE_ASSETS, &asset).await;

        UploadReceipt {
            stored_path: remote.path.clone(),
            stored_filename: stored_filename.to_string(),
            size_bytes: digest.size_bytes,
            content_hash: digest.content_hash,
            media_type: digest.media_type,
            revision: remote.revision.clone(),
            asset_id,
            replayed: false,
        }
    }
}
