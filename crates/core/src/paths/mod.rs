//! Canonical object-store paths for the property taxonomy.
//!
//! This module maps entities to absolute object-store paths. It contains **no I/O**: it only
//! constructs typed paths, so the layout invariants are defined in exactly one place and can
//! be tested without a store.
//!
//! # Layout
//!
//! ```text
//! <root>/01_Owners/<owner>/
//!     06_Properties/<property>/
//!         01_Units/<unit>/
//!             02_Tenancies/<tenancy key>/
//!             04_Turnover/<work order>/
//!         05_Work_Orders/<work order>/
//!         09_Applicants/<applicant>/
//! ```
//!
//! Every entity folder is named `<slug(name)>-<id>` (tenancies use a [`TenancyKey`]) and is
//! provisioned together with a fixed, ordered list of standard subfolders. The layout is
//! versioned by [`crate::constants::TAXONOMY_VERSION`].

mod applicant;
mod common;
mod documents;
mod owner;
mod property;
mod tenancy;
mod unit;
mod work_order;

pub use applicant::ApplicantPaths;
pub use common::{rebase_path, StorePath};
pub use documents::DocumentKind;
pub use owner::{DispositionsDir, OwnerPaths, OwnersDir, PropertiesDir};
pub use property::{ApplicantsDir, PropertyPaths, UnitsDir, WorkOrdersDir};
pub use tenancy::{TenancyKey, TenancyPaths};
pub use unit::{TenanciesDir, TurnoverDir, UnitPaths};
pub use work_order::WorkOrderPaths;

use crate::entity::{Entity, EntityKind};
use crate::{AltusError, AltusResult};

/// Standard subfolders provisioned for an entity of the given kind, in order.
pub fn standard_subfolders(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Owner => &OwnerPaths::SUBFOLDERS,
        EntityKind::Property => &PropertyPaths::SUBFOLDERS,
        EntityKind::Unit => &UnitPaths::SUBFOLDERS,
        EntityKind::Tenancy => &TenancyPaths::SUBFOLDERS,
        EntityKind::Applicant => &ApplicantPaths::SUBFOLDERS,
        EntityKind::WorkOrder => &WorkOrderPaths::SUBFOLDERS,
    }
}

/// Resolved base folder of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPaths {
    kind: EntityKind,
    base: StorePath,
}

impl EntityPaths {
    /// Resolves the canonical base folder of `entity` under `root`.
    ///
    /// The result depends only on `root` and the ids/names in the entity's chain.
    pub fn resolve(root: &StorePath, entity: &Entity) -> Self {
        let base = match entity {
            Entity::Owner { owner } => OwnerPaths::new(root, owner).base().clone(),
            Entity::Property { owner, property } => {
                let owner = OwnerPaths::new(root, owner);
                PropertyPaths::new(&owner, property).base().clone()
            }
            Entity::Unit {
                owner,
                property,
                unit,
            } => {
                let owner = OwnerPaths::new(root, owner);
                let property = PropertyPaths::new(&owner, property);
                UnitPaths::new(&property, unit).base().clone()
            }
            Entity::Tenancy {
                owner,
                property,
                unit,
                tenancy,
            } => {
                let owner = OwnerPaths::new(root, owner);
                let property = PropertyPaths::new(&owner, property);
                let unit = UnitPaths::new(&property, unit);
                TenancyPaths::new(&unit, &TenancyKey::from_meta(tenancy))
                    .base()
                    .clone()
            }
            Entity::Applicant {
                owner,
                property,
                applicant,
            } => {
                let owner = OwnerPaths::new(root, owner);
                let property = PropertyPaths::new(&owner, property);
                ApplicantPaths::new(&property, applicant).base().clone()
            }
            Entity::WorkOrder {
                owner,
                property,
                unit,
                work_order,
            } => {
                let owner = OwnerPaths::new(root, owner);
                let property = PropertyPaths::new(&owner, property);
                let unit = unit.as_ref().map(|unit| UnitPaths::new(&property, unit));
                WorkOrderPaths::new(&property, unit.as_ref(), work_order)
                    .base()
                    .clone()
            }
        };

        Self {
            kind: entity.kind(),
            base,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn base(&self) -> &StorePath {
        &self.base
    }

    /// Absolute paths of the standard subfolders, in provisioning order.
    pub fn subfolders(&self) -> Vec<StorePath> {
        standard_subfolders(self.kind)
            .iter()
            .map(|name| self.base.join(name))
            .collect()
    }

    /// Base followed by every standard subfolder.
    pub fn all(&self) -> Vec<StorePath> {
        let mut paths = Vec::with_capacity(1 + standard_subfolders(self.kind).len());
        paths.push(self.base.clone());
        paths.extend(self.subfolders());
        paths
    }

    /// Folder a document of `kind` is filed in for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`AltusError::InvalidInput`] if the document kind belongs to a different entity
    /// kind.
    pub fn document_folder(
        root: &StorePath,
        entity: &Entity,
        kind: DocumentKind,
    ) -> AltusResult<StorePath> {
        let (expected, subfolder) = kind.route();
        if entity.kind() != expected {
            return Err(AltusError::InvalidInput(format!(
                "document kind {kind:?} must be attached to a {expected}, not a {}",
                entity.kind()
            )));
        }
        Ok(Self::resolve(root, entity).base.join(subfolder))
    }
}
