//! Applicant folder layout.
//!
//! ```text
//! <property>/09_Applicants/<slug>-<applicant id>/
//!     01_Application/
//!     02_Screening/
//!     03_Income/
//!     04_Identification/
//! ```

use super::{PropertyPaths, StorePath};
use crate::entity::EntityRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantPaths {
    base: StorePath,
}

impl ApplicantPaths {
    pub const SUBFOLDERS: [&'static str; 4] = [
        "01_Application",
        "02_Screening",
        "03_Income",
        "04_Identification",
    ];

    pub fn new(property: &PropertyPaths, applicant: &EntityRef) -> Self {
        Self {
            base: property.applicants_dir().join(&applicant.segment()),
        }
    }

    pub fn base(&self) -> &StorePath {
        &self.base
    }
}
