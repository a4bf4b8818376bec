//! Property folder layout.
//!
//! A property lives inside its current owner's `06_Properties` container, so its path changes
//! when the property is transferred to another owner.
//!
//! ```text
//! <owner>/06_Properties/<slug>-<property id>/
//!     01_Units/
//!     02_Leases/
//!     03_Photos/
//!     04_Inspections/
//!     05_Work_Orders/
//!     06_Legal/
//!     07_Financials/
//!     08_Acquisition_Docs/
//!     09_Applicants/
//! ```

use super::{OwnerPaths, StorePath};
use crate::entity::EntityRef;

#[derive(Debug, Clone, Copy)]
pub struct UnitsDir;

impl UnitsDir {
    pub const NAME: &'static str = "01_Units";
}

/// Property-level work orders (not tied to a unit).
#[derive(Debug, Clone, Copy)]
pub struct WorkOrdersDir;

impl WorkOrdersDir {
    pub const NAME: &'static str = "05_Work_Orders";
}

#[derive(Debug, Clone, Copy)]
pub struct ApplicantsDir;

impl ApplicantsDir {
    pub const NAME: &'static str = "09_Applicants";
}

/// Paths for a single property under its current owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPaths {
    base: StorePath,
}

impl PropertyPaths {
    /// Standard subfolders, in provisioning order.
    pub const SUBFOLDERS: [&'static str; 9] = [
        UnitsDir::NAME,
        "02_Leases",
        "03_Photos",
        "04_Inspections",
        WorkOrdersDir::NAME,
        "06_Legal",
        "07_Financials",
        "08_Acquisition_Docs",
        ApplicantsDir::NAME,
    ];

    pub fn new(owner: &OwnerPaths, property: &EntityRef) -> Self {
        Self {
            base: owner.properties_dir().join(&property.segment()),
        }
    }

    pub fn base(&self) -> &StorePath {
        &self.base
    }

    pub fn units_dir(&self) -> StorePath {
        self.base.join(UnitsDir::NAME)
    }

    pub fn work_orders_dir(&self) -> StorePath {
        self.base.join(WorkOrdersDir::NAME)
    }

    pub fn applicants_dir(&self) -> StorePath {
        self.base.join(ApplicantsDir::NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_paths_follow_owner() {
        let root = StorePath::parse("/Root").unwrap();
        let acme = OwnerPaths::new(&root, &EntityRef::new(1, "Acme"));
        let rising = OwnerPaths::new(&root, &EntityRef::new(2, "Rising"));
        let sunset = EntityRef::new(7, "Sunset");

        assert_eq!(
            PropertyPaths::new(&acme, &sunset).base().as_str(),
            "/Root/01_Owners/acme-1/06_Properties/sunset-7"
        );
        assert_eq!(
            PropertyPaths::new(&rising, &sunset).base().as_str(),
            "/Root/01_Owners/rising-2/06_Properties/sunset-7"
        );
    }
}
