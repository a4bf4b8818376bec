#[allow(clippy::single_component_path_imports)]
use serde_yaml;

/// Failures reported by an object store or metadata store implementation.
///
/// Remote clients classify their transport and API errors into these variants so the services
/// can decide between "treat as success", "hard failure" and "retry later".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("conflict at {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("incorrect upload offset (store expected {expected})")]
    IncorrectOffset { expected: u64 },
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("store rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to decode store response: {0}")]
    Decode(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum AltusError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("parent folder missing for {0}")]
    ParentMissing(String),
    #[error(
        "provisioning stopped at {failed_path} after {} path(s): {source}",
        touched.len()
    )]
    PartialProvision {
        failed_path: String,
        touched: Vec<String>,
        #[source]
        source: Box<AltusError>,
    },
    #[error("unknown upload session: {0}")]
    UnknownSession(String),
    #[error("upload session {session_id} is {state}")]
    SessionNotActive { session_id: String, state: String },
    #[error("upload session {0} already has a request in flight")]
    SessionBusy(String),
    #[error("offset mismatch for upload session {session_id}: expected {expected}, got {actual}")]
    OffsetMismatch {
        session_id: String,
        expected: u64,
        actual: u64,
    },
    #[error("file asset {0} not found")]
    AssetNotFound(i64),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("file handling error: {0}")]
    Files(#[from] altus_files::FilesError),
    #[error("failed to convert record: {0}")]
    Record(serde_json::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
}

pub type AltusResult<T> = std::result::Result<T, AltusError>;

impl AltusError {
    /// True for failures worth retrying later without changing the request.
    pub fn is_transient(&self) -> bool {
        match self {
            AltusError::Store(StoreError::Transient(_)) => true,
            AltusError::PartialProvision { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_provision_message_counts_touched_paths() {
        let err = AltusError::PartialProvision {
            failed_path: "/R/b".into(),
            touched: vec!["/R/a".into()],
            source: Box::new(AltusError::Store(StoreError::Transient("timeout".into()))),
        };
        let message = err.to_string();
        assert!(message.contains("/R/b"));
        assert!(message.contains("1 path(s)"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_store_error_converts() {
        let err: AltusError = StoreError::NotFound("/x".into()).into();
        assert!(matches!(err, AltusError::Store(StoreError::NotFound(_))));
        assert!(!err.is_transient());
    }
}
