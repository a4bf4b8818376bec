//! Owner folder layout.
//!
//! ```text
//! <root>/
//!     01_Owners/
//!         <slug>-<owner id>/
//!             01_Agreements/
//!             02_Tax_W9/
//!             03_Banking_DD/
//!             04_Remittance_Packages/
//!             05_Communications/
//!             06_Properties/
//!             07_Notes/
//!             08_Dispositions/
//! ```

use super::StorePath;
use crate::entity::EntityRef;

/// Top-level container for every owner folder.
#[derive(Debug, Clone, Copy)]
pub struct OwnersDir;

impl OwnersDir {
    pub const NAME: &'static str = "01_Owners";
}

/// Container for the properties an owner currently holds.
///
/// Property subtrees move between owners' `06_Properties` folders on transfer.
#[derive(Debug, Clone, Copy)]
pub struct PropertiesDir;

impl PropertiesDir {
    pub const NAME: &'static str = "06_Properties";
}

/// Where transfer marker files are left for properties that moved away.
#[derive(Debug, Clone, Copy)]
pub struct DispositionsDir;

impl DispositionsDir {
    pub const NAME: &'static str = "08_Dispositions";
}

/// Paths for a single owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerPaths {
    base: StorePath,
}

impl OwnerPaths {
    /// Standard subfolders, in provisioning order.
    pub const SUBFOLDERS: [&'static str; 8] = [
        "01_Agreements",
        "02_Tax_W9",
        "03_Banking_DD",
        "04_Remittance_Packages",
        "05_Communications",
        PropertiesDir::NAME,
        "07_Notes",
        DispositionsDir::NAME,
    ];

    pub fn new(root: &StorePath, owner: &EntityRef) -> Self {
        Self {
            base: root.join(OwnersDir::NAME).join(&owner.segment()),
        }
    }

    pub fn base(&self) -> &StorePath {
        &self.base
    }

    pub fn properties_dir(&self) -> StorePath {
        self.base.join(PropertiesDir::NAME)
    }

    pub fn dispositions_dir(&self) -> StorePath {
        self.base.join(DispositionsDir::NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_paths() {
        let root = StorePath::parse("/Root").unwrap();
        let owner = OwnerPaths::new(&root, &EntityRef::new(1, "Acme Holdings"));

        assert_eq!(owner.base().as_str(), "/Root/01_Owners/acme-holdings-1");
        assert_eq!(
            owner.properties_dir().as_str(),
            "/Root/01_Owners/acme-holdings-1/06_Properties"
        );
        assert_eq!(
            owner.dispositions_dir().as_str(),
            "/Root/01_Owners/acme-holdings-1/08_Dispositions"
        );
    }
}
