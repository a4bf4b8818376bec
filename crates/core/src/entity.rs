//! Property-management entities addressed by the folder taxonomy.
//!
//! Entities form a strict tree:
//!
//! ```text
//! Owner
//!  └── Property
//!       ├── Unit
//!       │    ├── Tenancy
//!       │    └── WorkOrder (turnover)
//!       ├── Applicant
//!       └── WorkOrder
//! ```
//!
//! An entity has no identity in the object store beyond the path derived from its own
//! id/name and the ids/names of its ancestors. Each [`Entity`] variant therefore carries the
//! complete ancestor chain it needs, and nothing is looked up at path-construction time.

use crate::slug::slugify;
use crate::{AltusError, AltusResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one entity in the chain: numeric id plus optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

impl EntityRef {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    /// Folder name for this entity: `<slug(name)>-<id>`.
    pub fn segment(&self) -> String {
        format!("{}-{}", slugify(self.name.as_deref()), self.id)
    }

    fn validate(&self, role: &str) -> AltusResult<()> {
        if self.id <= 0 {
            return Err(AltusError::InvalidInput(format!(
                "{role} id must be a positive integer, got {}",
                self.id
            )));
        }
        Ok(())
    }
}

/// Identifiers describing a tenancy.
///
/// A tenancy is known by whichever of these the caller has; see
/// [`crate::paths::TenancyKey`] for how the folder name is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenancyMeta {
    #[serde(default)]
    pub lease_id: Option<i64>,
    #[serde(default)]
    pub application_id: Option<i64>,
    #[serde(default)]
    pub tenant_id: Option<i64>,
    #[serde(default)]
    pub tenant_name: Option<String>,
}

impl TenancyMeta {
    fn validate(&self) -> AltusResult<()> {
        for (field, value) in [
            ("lease_id", self.lease_id),
            ("application_id", self.application_id),
            ("tenant_id", self.tenant_id),
        ] {
            if let Some(id) = value {
                if id <= 0 {
                    return Err(AltusError::InvalidInput(format!(
                        "tenancy {field} must be a positive integer, got {id}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Kind of entity, without attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Owner,
    Property,
    Unit,
    Tenancy,
    Applicant,
    WorkOrder,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Owner,
        EntityKind::Property,
        EntityKind::Unit,
        EntityKind::Tenancy,
        EntityKind::Applicant,
        EntityKind::WorkOrder,
    ];

    /// Value stored in the `entity_type` column of metadata rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Owner => "owner",
            EntityKind::Property => "property",
            EntityKind::Unit => "unit",
            EntityKind::Tenancy => "tenancy",
            EntityKind::Applicant => "applicant",
            EntityKind::WorkOrder => "work_order",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An addressable entity together with its ancestor chain.
///
/// Serialised adjacently tagged, which is also the request shape accepted by the REST
/// surface:
///
/// ```json
/// { "entity_type": "unit",
///   "attributes": { "owner": {"id": 1, "name": "Acme"},
///                   "property": {"id": 7, "name": "Sunset"},
///                   "unit": {"id": 3, "name": "4B"} } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "attributes", rename_all = "snake_case")]
pub enum Entity {
    Owner {
        owner: EntityRef,
    },
    Property {
        owner: EntityRef,
        property: EntityRef,
    },
    Unit {
        owner: EntityRef,
        property: EntityRef,
        unit: EntityRef,
    },
    Tenancy {
        owner: EntityRef,
        property: EntityRef,
        unit: EntityRef,
        tenancy: TenancyMeta,
    },
    Applicant {
        owner: EntityRef,
        property: EntityRef,
        applicant: EntityRef,
    },
    WorkOrder {
        owner: EntityRef,
        property: EntityRef,
        #[serde(default)]
        unit: Option<EntityRef>,
        work_order: EntityRef,
    },
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Owner { .. } => EntityKind::Owner,
            Entity::Property { .. } => EntityKind::Property,
            Entity::Unit { .. } => EntityKind::Unit,
            Entity::Tenancy { .. } => EntityKind::Tenancy,
            Entity::Applicant { .. } => EntityKind::Applicant,
            Entity::WorkOrder { .. } => EntityKind::WorkOrder,
        }
    }

    /// Numeric id recorded against uploaded documents.
    ///
    /// A tenancy reports its lease, application or tenant id in that order, and `None` when
    /// it is only known by tenant name.
    pub fn id(&self) -> Option<i64> {
        match self {
            Entity::Owner { owner } => Some(owner.id),
            Entity::Property { property, .. } => Some(property.id),
            Entity::Unit { unit, .. } => Some(unit.id),
            Entity::Tenancy { tenancy, .. } => tenancy
                .lease_id
                .or(tenancy.application_id)
                .or(tenancy.tenant_id),
            Entity::Applicant { applicant, .. } => Some(applicant.id),
            Entity::WorkOrder { work_order, .. } => Some(work_order.id),
        }
    }

    /// Checks every id in the chain.
    ///
    /// # Errors
    ///
    /// Returns [`AltusError::InvalidInput`] naming the first offending attribute.
    pub fn validate(&self) -> AltusResult<()> {
        match self {
            Entity::Owner { owner } => owner.validate("owner"),
            Entity::Property { owner, property } => {
                owner.validate("owner")?;
                property.validate("property")
            }
            Entity::Unit {
                owner,
                property,
                unit,
            } => {
                owner.validate("owner")?;
                property.validate("property")?;
                unit.validate("unit")
            }
            Entity::Tenancy {
                owner,
                property,
                unit,
                tenancy,
            } => {
                owner.validate("owner")?;
                property.validate("property")?;
                unit.validate("unit")?;
                tenancy.validate()
            }
            Entity::Applicant {
                owner,
                property,
                applicant,
            } => {
                owner.validate("owner")?;
                property.validate("property")?;
                applicant.validate("applicant")
            }
            Entity::WorkOrder {
                owner,
                property,
                unit,
                work_order,
            } => {
                owner.validate("owner")?;
                property.validate("property")?;
                if let Some(unit) = unit {
                    unit.validate("unit")?;
                }
                work_order.validate("work order")
            }
        }
    }

    /// The entity this one is filed under, if any.
    pub fn parent(&self) -> Option<Entity> {
        match self {
            Entity::Owner { .. } => None,
            Entity::Property { owner, .. } => Some(Entity::Owner {
                owner: owner.clone(),
            }),
            Entity::Unit {
                owner, property, ..
            }
            | Entity::Applicant {
                owner, property, ..
            }
            | Entity::WorkOrder {
                owner,
                property,
                unit: None,
                ..
            } => Some(Entity::Property {
                owner: owner.clone(),
                property: property.clone(),
            }),
            Entity::Tenancy {
                owner,
                property,
                unit,
                ..
            }
            | Entity::WorkOrder {
                owner,
                property,
                unit: Some(unit),
                ..
            } => Some(Entity::Unit {
                owner: owner.clone(),
                property: property.clone(),
                unit: unit.clone(),
            }),
        }
    }

    /// The chain from the owner down to and including this entity.
    pub fn lineage(&self) -> Vec<Entity> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(entity) = current {
            current = entity.parent();
            chain.push(entity);
        }
        chain.reverse();
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> EntityRef {
        EntityRef::new(1, "Acme")
    }

    fn sunset() -> EntityRef {
        EntityRef::new(7, "Sunset")
    }

    #[test]
    fn test_segment_uses_slug_and_id() {
        assert_eq!(acme().segment(), "acme-1");
        assert_eq!(EntityRef { id: 9, name: None }.segment(), "unnamed-9");
    }

    #[test]
    fn test_deserialise_tagged_entity() {
        let json = r#"{
            "entity_type": "work_order",
            "attributes": {
                "owner": {"id": 1, "name": "Acme"},
                "property": {"id": 7, "name": "Sunset"},
                "work_order": {"id": 55, "name": "Leaky tap"}
            }
        }"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.kind(), EntityKind::WorkOrder);
        assert_eq!(entity.id(), Some(55));
        assert!(matches!(entity, Entity::WorkOrder { unit: None, .. }));
    }

    #[test]
    fn test_unknown_entity_type_is_rejected() {
        let json = r#"{"entity_type": "building", "attributes": {"owner": {"id": 1}}}"#;
        assert!(serde_json::from_str::<Entity>(json).is_err());
    }

    #[test]
    fn test_missing_required_attribute_is_rejected() {
        let json = r#"{"entity_type": "property", "attributes": {"owner": {"id": 1}}}"#;
        assert!(serde_json::from_str::<Entity>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_ids() {
        let entity = Entity::Property {
            owner: acme(),
            property: EntityRef::new(0, "Sunset"),
        };
        let err = entity.validate().unwrap_err();
        assert!(err.to_string().contains("property id"));

        let tenancy = Entity::Tenancy {
            owner: acme(),
            property: sunset(),
            unit: EntityRef::new(3, "4B"),
            tenancy: TenancyMeta {
                lease_id: Some(-4),
                ..TenancyMeta::default()
            },
        };
        assert!(tenancy.validate().is_err());
    }

    #[test]
    fn test_tenancy_id_priority() {
        let entity = Entity::Tenancy {
            owner: acme(),
            property: sunset(),
            unit: EntityRef::new(3, "4B"),
            tenancy: TenancyMeta {
                lease_id: None,
                application_id: Some(12),
                tenant_id: Some(99),
                tenant_name: None,
            },
        };
        assert_eq!(entity.id(), Some(12));
    }

    #[test]
    fn test_lineage_runs_owner_first() {
        let entity = Entity::WorkOrder {
            owner: acme(),
            property: sunset(),
            unit: Some(EntityRef::new(3, "4B")),
            work_order: EntityRef::new(55, "Paint"),
        };
        let kinds: Vec<EntityKind> = entity.lineage().iter().map(Entity::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntityKind::Owner,
                EntityKind::Property,
                EntityKind::Unit,
                EntityKind::WorkOrder
            ]
        );
    }

    #[test]
    fn test_property_level_work_order_parent_is_property() {
        let entity = Entity::WorkOrder {
            owner: acme(),
            property: sunset(),
            unit: None,
            work_order: EntityRef::new(55, "Paint"),
        };
        assert_eq!(
            entity.parent().map(|p| p.kind()),
            Some(EntityKind::Property)
        );
    }
}
