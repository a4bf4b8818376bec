//! Idempotent folder provisioning.
//!
//! Provisioning is safe to repeat and safe to run concurrently for the same entity: a folder
//! that already exists counts as success (`created = false`), so two callers racing on one
//! path both succeed and exactly one of them reports having created it. There is no
//! rollback. A failure part-way through reports the paths already touched and the caller
//! re-runs the whole call.

use crate::config::CoreConfig;
use crate::entity::Entity;
use crate::paths::{EntityPaths, StorePath};
use crate::records::{SyncAudit, SYNC_AUDIT};
use crate::services::record_best_effort;
use crate::stores::Stores;
use crate::{AltusError, AltusResult, StoreError};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Result of ensuring one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnsuredFolder {
    pub path: StorePath,
    /// False when the folder already existed.
    pub created: bool,
}

/// Result of provisioning one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionOutcome {
    pub base: StorePath,
    /// Base followed by every standard subfolder.
    pub paths: Vec<StorePath>,
    /// The subset of `paths` this call created.
    pub newly_created: Vec<StorePath>,
}

/// Creates taxonomy folders in the object store.
#[derive(Clone, Debug)]
pub struct FolderProvisioner {
    cfg: Arc<CoreConfig>,
    stores: Stores,
}

impl FolderProvisioner {
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self { cfg, stores }
    }

    /// Validates `entity` and resolves its canonical paths. No store access.
    pub fn resolve(&self, entity: &Entity) -> AltusResult<EntityPaths> {
        entity.validate()?;
        Ok(EntityPaths::resolve(self.cfg.taxonomy_root(), entity))
    }

    /// Ensures a single folder exists.
    ///
    /// # Errors
    ///
    /// - [`AltusError::ParentMissing`] if the parent folder does not exist.
    /// - [`AltusError::Store`] for any other store failure.
    pub async fn ensure(&self, path: &StorePath) -> AltusResult<EnsuredFolder> {
        match self.stores.objects.create_folder(path).await {
            Ok(_) => {
                tracing::info!(path = %path, "created folder");
                Ok(EnsuredFolder {
                    path: path.clone(),
                    created: true,
                })
            }
            Err(StoreError::Conflict(_)) => Ok(EnsuredFolder {
                path: path.clone(),
                created: false,
            }),
            Err(StoreError::NotFound(_)) => Err(AltusError::ParentMissing(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Ensures `path` and every folder between the taxonomy root and it, root first.
    ///
    /// # Errors
    ///
    /// Returns [`AltusError::InvalidInput`] if `path` is not within the taxonomy root, or the
    /// first failing [`Self::ensure`] error.
    pub async fn ensure_tree(&self, path: &StorePath) -> AltusResult<Vec<EnsuredFolder>> {
        let root = self.cfg.taxonomy_root();
        let chain = path.chain_from(root).ok_or_else(|| {
            AltusError::InvalidInput(format!("{path} is outside the taxonomy root {root}"))
        })?;

        let mut ensured = Vec::with_capacity(chain.len());
        for folder in &chain {
            ensured.push(self.ensure(folder).await?);
        }
        Ok(ensured)
    }

    /// Ensures the entity's base folder and all its standard subfolders.
    ///
    /// The entity's parent container must already exist, except for owners, whose container
    /// chain under the root is created on demand.
    ///
    /// # Errors
    ///
    /// Returns [`AltusError::PartialProvision`] naming the failing path and the paths already
    /// ensured. Nothing is rolled back.
    #[tracing::instrument(skip_all, fields(entity_type = %entity.kind()))]
    pub async fn provision_entity(&self, entity: &Entity) -> AltusResult<ProvisionOutcome> {
        let paths = self.resolve(entity)?;
        let targets = paths.all();
        let base = paths.base().clone();

        let result = self.ensure_all(entity, &base, &targets).await;

        let (status, detail, touched, created) = match &result {
            Ok(outcome) => (
                "ok",
                None,
                outcome.paths.len(),
                outcome.newly_created.len(),
            ),
            Err(e) => {
                let touched = match e {
                    AltusError::PartialProvision { touched, .. } => touched.len(),
                    _ => 0,
                };
                ("partial", Some(e.to_string()), touched, 0)
            }
        };

        let audit = SyncAudit {
            entity_type: entity.kind().to_string(),
            entity_id: entity.id(),
            base_path: base.to_string(),
            paths_touched: touched as u64,
            newly_created: created as u64,
            status: status.to_string(),
            detail,
            recorded_at: Utc::now(),
        };
        record_best_effort(self.stores.metadata.as_ref(), SYNC_AUDIT, &audit).await;

        result
    }

    async fn ensure_all(
        &self,
        entity: &Entity,
        base: &StorePath,
        targets: &[StorePath],
    ) -> AltusResult<ProvisionOutcome> {
        let mut touched: Vec<String> = Vec::with_capacity(targets.len());
        let partial = |failed: &StorePath, touched: &[String], source: AltusError| {
            AltusError::PartialProvision {
                failed_path: failed.to_string(),
                touched: touched.to_vec(),
                source: Box::new(source),
            }
        };

        if entity.parent().is_none() {
            if let Some(container) = base.parent() {
                self.ensure_tree(&container)
                    .await
                    .map_err(|e| partial(&container, &touched, e))?;
            }
        }

        let mut newly_created = Vec::new();
        for path in targets {
            match self.ensure(path).await {
                Ok(ensured) => {
                    touched.push(path.to_string());
                    if ensured.created {
                        newly_created.push(ensured.path);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "provisioning stopped");
                    return Err(partial(path, &touched, e));
                }
            }
        }

        Ok(ProvisionOutcome {
            base: base.clone(),
            paths: targets.to_vec(),
            newly_created,
        })
    }

    /// Provisions every ancestor of `entity`, owner first, and then `entity` itself.
    ///
    /// Each entity is fully provisioned before any of its children.
    pub async fn provision_lineage(&self, entity: &Entity) -> AltusResult<Vec<ProvisionOutcome>> {
        entity.validate()?;
        let mut outcomes = Vec::new();
        for member in entity.lineage() {
            outcomes.push(self.provision_entity(&member).await?);
        }
        Ok(outcomes)
    }
}
