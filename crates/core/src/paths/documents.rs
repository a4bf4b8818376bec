//! Routing of uploaded documents to taxonomy folders.
//!
//! Each [`DocumentKind`] belongs to exactly one entity kind and is filed in one of that
//! kind's standard subfolders. The routing table is closed: adding a kind means adding a
//! match arm here, and the compiler points at every place that needs it.

use crate::entity::EntityKind;
use serde::{Deserialize, Serialize};

/// Kind of document being uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    // Property
    PropertyPhoto,
    PropertyInspection,
    PropertyLegal,
    PropertyFinancial,
    AcquisitionDoc,
    // Unit
    UnitPhoto,
    UnitInspection,
    TurnoverDoc,
    // Tenancy
    LeaseSigned,
    LeaseAmendment,
    LeaseAddendum,
    TenantCorrespondence,
    TenantNotice,
    RentReceipt,
    SubsidyDoc,
    MoveInDoc,
    MoveOutDoc,
    TenantLegal,
    TenantCompliance,
    TenantDocument,
    // Owner
    OwnerManagementAgreement,
    OwnerW9,
    OwnerDirectDeposit,
    OwnerRemitPackage,
    OwnerCommunication,
    // Applicant
    ApplicantDoc,
    // Work order
    WorkOrderPhoto,
    WorkOrderQuote,
    WorkOrderInvoice,
    WorkOrderDoc,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 30] = [
        DocumentKind::PropertyPhoto,
        DocumentKind::PropertyInspection,
        DocumentKind::PropertyLegal,
        DocumentKind::PropertyFinancial,
        DocumentKind::AcquisitionDoc,
        DocumentKind::UnitPhoto,
        DocumentKind::UnitInspection,
        DocumentKind::TurnoverDoc,
        DocumentKind::LeaseSigned,
        DocumentKind::LeaseAmendment,
        DocumentKind::LeaseAddendum,
        DocumentKind::TenantCorrespondence,
        DocumentKind::TenantNotice,
        DocumentKind::RentReceipt,
        DocumentKind::SubsidyDoc,
        DocumentKind::MoveInDoc,
        DocumentKind::MoveOutDoc,
        DocumentKind::TenantLegal,
        DocumentKind::TenantCompliance,
        DocumentKind::TenantDocument,
        DocumentKind::OwnerManagementAgreement,
        DocumentKind::OwnerW9,
        DocumentKind::OwnerDirectDeposit,
        DocumentKind::OwnerRemitPackage,
        DocumentKind::OwnerCommunication,
        DocumentKind::ApplicantDoc,
        DocumentKind::WorkOrderPhoto,
        DocumentKind::WorkOrderQuote,
        DocumentKind::WorkOrderInvoice,
        DocumentKind::WorkOrderDoc,
    ];

    /// Entity kind this document must be attached to, and the subfolder it is filed in.
    pub fn route(&self) -> (EntityKind, &'static str) {
        use DocumentKind::*;
        match self {
            PropertyPhoto => (EntityKind::Property, "03_Photos"),
            PropertyInspection => (EntityKind::Property, "04_Inspections"),
            PropertyLegal => (EntityKind::Property, "06_Legal"),
            PropertyFinancial => (EntityKind::Property, "07_Financials"),
            AcquisitionDoc => (EntityKind::Property, "08_Acquisition_Docs"),

            UnitPhoto => (EntityKind::Unit, "01_Photos"),
            UnitInspection => (EntityKind::Unit, "03_Inspections"),
            TurnoverDoc => (EntityKind::Unit, "04_Turnover"),

            LeaseSigned | LeaseAmendment | LeaseAddendum => (EntityKind::Tenancy, "02_Lease"),
            TenantCorrespondence => (EntityKind::Tenancy, "03_Correspondence"),
            TenantNotice => (EntityKind::Tenancy, "04_Notices"),
            RentReceipt => (EntityKind::Tenancy, "05_Rent"),
            SubsidyDoc => (EntityKind::Tenancy, "06_Subsidy"),
            MoveInDoc => (EntityKind::Tenancy, "08_Move_In"),
            MoveOutDoc => (EntityKind::Tenancy, "09_Move_Out"),
            TenantLegal => (EntityKind::Tenancy, "10_Legal"),
            TenantCompliance => (EntityKind::Tenancy, "11_Compliance"),
            TenantDocument => (EntityKind::Tenancy, "12_Documents"),

            OwnerManagementAgreement => (EntityKind::Owner, "01_Agreements"),
            OwnerW9 => (EntityKind::Owner, "02_Tax_W9"),
            OwnerDirectDeposit => (EntityKind::Owner, "03_Banking_DD"),
            OwnerRemitPackage => (EntityKind::Owner, "04_Remittance_Packages"),
            OwnerCommunication => (EntityKind::Owner, "05_Communications"),

            ApplicantDoc => (EntityKind::Applicant, "01_Application"),

            WorkOrderPhoto => (EntityKind::WorkOrder, "01_Photos"),
            WorkOrderQuote => (EntityKind::WorkOrder, "02_Quotes"),
            WorkOrderInvoice => (EntityKind::WorkOrder, "03_Invoices"),
            WorkOrderDoc => (EntityKind::WorkOrder, "04_Completion"),
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.route().0
    }

    pub fn subfolder(&self) -> &'static str {
        self.route().1
    }
}
