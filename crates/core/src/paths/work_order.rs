//! Work order folder layout.
//!
//! Work orders attached to a unit are turnover jobs and live in the unit's `04_Turnover`
//! container. All other work orders live in the property's `05_Work_Orders` container.
//!
//! ```text
//! <unit>/04_Turnover/<slug>-<work order id>/        (unit present)
//! <property>/05_Work_Orders/<slug>-<work order id>/ (no unit)
//!     01_Photos/
//!     02_Quotes/
//!     03_Invoices/
//!     04_Completion/
//! ```

use super::{PropertyPaths, StorePath, UnitPaths};
use crate::entity::EntityRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrderPaths {
    base: StorePath,
}

impl WorkOrderPaths {
    pub const SUBFOLDERS: [&'static str; 4] =
        ["01_Photos", "02_Quotes", "03_Invoices", "04_Completion"];

    pub fn new(property: &PropertyPaths, unit: Option<&UnitPaths>, work_order: &EntityRef) -> Self {
        let container = match unit {
            Some(unit) => unit.turnover_dir(),
            None => property.work_orders_dir(),
        };
        Self {
            base: container.join(&work_order.segment()),
        }
    }

    pub fn base(&self) -> &StorePath {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::OwnerPaths;

    #[test]
    fn test_work_order_placement_depends_on_unit() {
        let root = StorePath::parse("/Root").unwrap();
        let owner = OwnerPaths::new(&root, &EntityRef::new(1, "Acme"));
        let property = PropertyPaths::new(&owner, &EntityRef::new(7, "Sunset"));
        let unit = UnitPaths::new(&property, &EntityRef::new(3, "4B"));
        let job = EntityRef::new(55, "Repaint");

        assert_eq!(
            WorkOrderPaths::new(&property, Some(&unit), &job).base().as_str(),
            "/Root/01_Owners/acme-1/06_Properties/sunset-7/01_Units/4b-3/04_Turnover/repaint-55"
        );
        assert_eq!(
            WorkOrderPaths::new(&property, None, &job).base().as_str(),
            "/Root/01_Owners/acme-1/06_Properties/sunset-7/05_Work_Orders/repaint-55"
        );
    }
}
