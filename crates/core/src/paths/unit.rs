//! Unit folder layout.
//!
//! ```text
//! <property>/01_Units/<slug>-<unit id>/
//!     01_Photos/
//!     02_Tenancies/
//!     03_Inspections/
//!     04_Turnover/
//! ```

use super::{PropertyPaths, StorePath};
use crate::entity::EntityRef;

#[derive(Debug, Clone, Copy)]
pub struct TenanciesDir;

impl TenanciesDir {
    pub const NAME: &'static str = "02_Tenancies";
}

/// Unit turnover work orders are filed here rather than under the property.
#[derive(Debug, Clone, Copy)]
pub struct TurnoverDir;

impl TurnoverDir {
    pub const NAME: &'static str = "04_Turnover";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    base: StorePath,
}

impl UnitPaths {
    pub const SUBFOLDERS: [&'static str; 4] = [
        "01_Photos",
        TenanciesDir::NAME,
        "03_Inspections",
        TurnoverDir::NAME,
    ];

    pub fn new(property: &PropertyPaths, unit: &EntityRef) -> Self {
        Self {
            base: property.units_dir().join(&unit.segment()),
        }
    }

    pub fn base(&self) -> &StorePath {
        &self.base
    }

    pub fn tenancies_dir(&self) -> StorePath {
        self.base.join(TenanciesDir::NAME)
    }

    pub fn turnover_dir(&self) -> StorePath {
        self.base.join(TurnoverDir::NAME)
    }
}
