use altus_core::StoreError;

/// Errors raised while building a remote client, before any request is made.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),
    #[error("invalid remote configuration: {0}")]
    Configuration(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Maps a failed HTTP status onto the store error taxonomy.
///
/// Throttling and server-side failures are transient; everything else is a rejection
/// carrying the status and the (possibly truncated) response text.
pub(crate) fn status_error(status: u16, message: &str) -> StoreError {
    let message = truncate(message, 300);
    match status {
        409 => StoreError::Conflict(message),
        404 => StoreError::NotFound(message),
        429 | 500..=599 => StoreError::Transient(format!("status {status}: {message}")),
        _ => StoreError::Rejected { status, message },
    }
}

/// Failures to reach the remote at all are worth retrying.
pub(crate) fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_decode() {
        StoreError::Decode(e.to_string())
    } else {
        StoreError::Transient(e.to_string())
    }
}

fn truncate(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_classification() {
        assert_eq!(status_error(409, "dup"), StoreError::Conflict("dup".into()));
        assert_eq!(status_error(404, "gone"), StoreError::NotFound("gone".into()));
        assert!(matches!(status_error(429, "slow down"), StoreError::Transient(_)));
        assert!(matches!(status_error(503, ""), StoreError::Transient(_)));
        assert_eq!(
            status_error(400, "bad"),
            StoreError::Rejected {
                status: 400,
                message: "bad".into()
            }
        );
    }

    #[test]
    fn test_long_messages_are_truncated() {
        let long = "x".repeat(1000);
        match status_error(400, &long) {
            StoreError::Rejected { message, .. } => assert_eq!(message.len(), 300),
            other => panic!("unexpected {other:?}"),
        }
    }
}
