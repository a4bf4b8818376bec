use crate::records::FILE_ASSETS;
use crate::stores::{Query, Stores};
use serde::{Deserialize, Serialize};

/// Reachability of one backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub ok: bool,
    pub detail: String,
}

impl ComponentHealth {
    fn up(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    fn down(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub ok: bool,
    pub object_store: ComponentHealth,
    pub metadata_store: ComponentHealth,
}

/// Checks both stores.
///
/// The object store is asked for the identity of the account its credentials belong to, and
/// the metadata store for a single row of the file asset table. Neither check writes anything.
#[derive(Clone, Debug)]
pub struct HealthService {
    stores: Stores,
}

impl HealthService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn check(&self) -> HealthReport {
        let object_store = match self.stores.objects.account_identity().await {
            Ok(identity) => ComponentHealth::up(
                identity
                    .email
                    .or(identity.display_name)
                    .unwrap_or(identity.account_id),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "object store health check failed");
                ComponentHealth::down(e.to_string())
            }
        };

        let query = Query::new().order_by("id").limit(1);
        let metadata_store = match self.stores.metadata.select(FILE_ASSETS, &query).await {
            Ok(_) => ComponentHealth::up(FILE_ASSETS),
            Err(e) => {
                tracing::warn!(error = %e, "metadata store health check failed");
                ComponentHealth::down(e.to_string())
            }
        };

        HealthReport {
            ok: object_store.ok && metadata_store.ok,
            object_store,
            metadata_store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{InMemoryMetadataStore, InMemoryObjectStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_healthy_in_memory_stores() {
        let report = HealthService::new(Stores::in_memory()).check().await;
        assert!(report.ok);
        assert_eq!(report.object_store.detail, "In-memory object store");
        assert_eq!(report.metadata_store.detail, "file_assets");
    }

    #[tokio::test]
    async fn test_unreachable_metadata_store_is_reported() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        metadata.set_unavailable(true);
        let stores = Stores::new(Arc::new(InMemoryObjectStore::new()), metadata);

        let report = HealthService::new(stores).check().await;
        assert!(!report.ok);
        assert!(report.object_store.ok);
        assert!(!report.metadata_store.ok);
    }
}
