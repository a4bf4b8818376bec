//! Tenancy folder layout and folder-key selection.
//!
//! A tenancy folder sits in its unit's `02_Tenancies` container. Unlike the other entities it
//! is not named `<slug>-<id>`: callers know a tenancy by whichever identifier they hold at the
//! time (a lease, an application, a tenant), so the folder name is a [`TenancyKey`] chosen
//! from those identifiers in a fixed order.
//!
//! ```text
//! <unit>/02_Tenancies/<tenancy key>/
//!     01_Application/
//!     02_Lease/
//!     03_Correspondence/
//!     04_Notices/
//!     05_Rent/
//!     06_Subsidy/
//!     07_Inspections/
//!     08_Move_In/
//!     09_Move_Out/
//!     10_Legal/
//!     11_Compliance/
//!     12_Documents/
//! ```

use super::{StorePath, UnitPaths};
use crate::entity::TenancyMeta;
use crate::slug::slugify;
use std::fmt;

/// Folder identity of a tenancy.
///
/// Chosen by [`TenancyKey::from_meta`] with the priority lease id, then application id, then
/// tenant id, then tenant name. The first identifier present wins. Changing this order
/// changes which folder an existing tenancy resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenancyKey {
    Lease(i64),
    Application(i64),
    Tenant(i64),
    /// Slug of the tenant's name (the slug sentinel when no name is known).
    TenantName(String),
}

impl TenancyKey {
    pub fn from_meta(meta: &TenancyMeta) -> Self {
        if let Some(id) = meta.lease_id {
            TenancyKey::Lease(id)
        } else if let Some(id) = meta.application_id {
            TenancyKey::Application(id)
        } else if let Some(id) = meta.tenant_id {
            TenancyKey::Tenant(id)
        } else {
            TenancyKey::TenantName(slugify(meta.tenant_name.as_deref()))
        }
    }
}

impl fmt::Display for TenancyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenancyKey::Lease(id) => write!(f, "lease-{id}"),
            TenancyKey::Application(id) => write!(f, "application-{id}"),
            TenancyKey::Tenant(id) => write!(f, "tenant-{id}"),
            TenancyKey::TenantName(slug) => write!(f, "tenant-{slug}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenancyPaths {
    base: StorePath,
}

impl TenancyPaths {
    pub const SUBFOLDERS: [&'static str; 12] = [
        "01_Application",
        "02_Lease",
        "03_Correspondence",
        "04_Notices",
        "05_Rent",
        "06_Subsidy",
        "07_Inspections",
        "08_Move_In",
        "09_Move_Out",
        "10_Legal",
        "11_Compliance",
        "12_Documents",
    ];

    pub fn new(unit: &UnitPaths, key: &TenancyKey) -> Self {
        Self {
            base: unit.tenancies_dir().join(&key.to_string()),
        }
    }

    pub fn base(&self) -> &StorePath {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_priority_is_lease_application_tenant_name() {
        let mut meta = TenancyMeta {
            lease_id: Some(40),
            application_id: Some(30),
            tenant_id: Some(20),
            tenant_name: Some("Jane Doe".into()),
        };
        assert_eq!(TenancyKey::from_meta(&meta).to_string(), "lease-40");

        meta.lease_id = None;
        assert_eq!(TenancyKey::from_meta(&meta).to_string(), "application-30");

        meta.application_id = None;
        assert_eq!(TenancyKey::from_meta(&meta).to_string(), "tenant-20");

        meta.tenant_id = None;
        assert_eq!(TenancyKey::from_meta(&meta).to_string(), "tenant-jane-doe");

        meta.tenant_name = None;
        assert_eq!(TenancyKey::from_meta(&meta).to_string(), "tenant-unnamed");
    }
}
