//! # Altus Core
//!
//! Core business logic for the Altus property document taxonomy.
//!
//! This crate contains:
//! - the [`slug`] encoder and [`paths`] taxonomy (pure, no I/O)
//! - the [`entity`] model addressed by the taxonomy
//! - the [`stores`] seams to the object store and metadata store, with in-memory implementations
//! - the [`services`]: folder provisioning, upload sessions, document uploads and property
//!   transfers
//!
//! **No API concerns**: HTTP clients for the remote stores live in `altus-remote`, and the REST
//! surface lives in `api-rest`.

pub mod config;
pub mod constants;
pub mod entity;
pub mod error;
pub mod paths;
pub mod records;
pub mod services;
pub mod slug;
pub mod stores;

pub use config::CoreConfig;
pub use entity::{Entity, EntityKind, EntityRef, TenancyMeta};
pub use error::{AltusError, AltusResult, StoreError, StoreResult};
pub use paths::{DocumentKind, EntityPaths, StorePath};
pub use services::documents::{
    AssetLink, DocumentService, DocumentTarget, UploadReceipt, UploadRequest,
};
pub use services::health::{ComponentHealth, HealthReport, HealthService};
pub use services::provision::{EnsuredFolder, FolderProvisioner, ProvisionOutcome};
pub use services::transfer::{
    BulkTransferRequest, StepError, TransferEngine, TransferReport, TransferRequest, TransferStep,
};
pub use services::upload::{UploadCursor, UploadSessionManager, UploadState};
pub use slug::slugify;
pub use stores::{MetadataStore, ObjectStore, Stores, WriteMode};
