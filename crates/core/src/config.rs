//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read process-wide environment variables while
//! handling a request; the binary parses the environment with the `*_from_env_value` helpers
//! below and builds a single [`CoreConfig`].

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD, DEFAULT_RELINK_PAGE_SIZE,
    DEFAULT_SESSION_IDLE_TIMEOUT_SECS, DEFAULT_TAXONOMY_ROOT, DEFAULT_UPLOADER, MAX_CHUNK_SIZE,
    MAX_RELINK_PAGE_SIZE,
};
use crate::paths::StorePath;
use crate::{AltusError, AltusResult};
use std::str::FromStr;
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    taxonomy_root: StorePath,
    chunk_threshold: u64,
    chunk_size: u64,
    relink_page_size: u32,
    session_idle_timeout: Duration,
    uploader: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`AltusError::Configuration`] if:
    /// - `taxonomy_root` is not an absolute path without a trailing slash,
    /// - `chunk_size` is zero or larger than the object store accepts,
    /// - `relink_page_size` is outside `1..=1000`,
    /// - `uploader` is empty.
    pub fn new(
        taxonomy_root: &str,
        chunk_threshold: u64,
        chunk_size: u64,
        relink_page_size: u32,
        session_idle_timeout: Duration,
        uploader: String,
    ) -> AltusResult<Self> {
        let taxonomy_root = StorePath::parse(taxonomy_root).map_err(|e| {
            AltusError::Configuration(format!("taxonomy root is not a valid path: {e}"))
        })?;

        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(AltusError::Configuration(format!(
                "chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes, got {chunk_size}"
            )));
        }

        // Anything at or below the threshold goes up in one request.
        if chunk_threshold > MAX_CHUNK_SIZE {
            return Err(AltusError::Configuration(format!(
                "chunk threshold cannot exceed the single request limit of {MAX_CHUNK_SIZE} bytes, got {chunk_threshold}"
            )));
        }

        if relink_page_size == 0 || relink_page_size > MAX_RELINK_PAGE_SIZE {
            return Err(AltusError::Configuration(format!(
                "relink page size must be between 1 and {MAX_RELINK_PAGE_SIZE}, got {relink_page_size}"
            )));
        }

        if uploader.trim().is_empty() {
            return Err(AltusError::Configuration("uploader cannot be empty".into()));
        }

        Ok(Self {
            taxonomy_root,
            chunk_threshold,
            chunk_size,
            relink_page_size,
            session_idle_timeout,
            uploader,
        })
    }

    pub fn taxonomy_root(&self) -> &StorePath {
        &self.taxonomy_root
    }

    /// Payloads larger than this go through an upload session.
    pub fn chunk_threshold(&self) -> u64 {
        self.chunk_threshold
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn relink_page_size(&self) -> u32 {
        self.relink_page_size
    }

    pub fn session_idle_timeout(&self) -> Duration {
        self.session_idle_timeout
    }

    pub fn uploader(&self) -> &str {
        &self.uploader
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            taxonomy_root: StorePath::new_unchecked(DEFAULT_TAXONOMY_ROOT),
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            relink_page_size: DEFAULT_RELINK_PAGE_SIZE,
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
            uploader: DEFAULT_UPLOADER.to_string(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(name: &str, value: Option<String>, default: T) -> AltusResult<T> {
    match non_empty(value) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|_| AltusError::Configuration(format!("{name} is not a valid number: {v}"))),
    }
}

/// Parse the taxonomy root from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_TAXONOMY_ROOT`].
pub fn taxonomy_root_from_env_value(value: Option<String>) -> String {
    non_empty(value).unwrap_or_else(|| DEFAULT_TAXONOMY_ROOT.to_string())
}

/// Parse the single-shot upload threshold (bytes) from an optional string value.
pub fn chunk_threshold_from_env_value(value: Option<String>) -> AltusResult<u64> {
    parse_number("ALTUS_CHUNK_THRESHOLD", value, DEFAULT_CHUNK_THRESHOLD)
}

/// Parse the session chunk size (bytes) from an optional string value.
pub fn chunk_size_from_env_value(value: Option<String>) -> AltusResult<u64> {
    parse_number("ALTUS_CHUNK_SIZE", value, DEFAULT_CHUNK_SIZE)
}

/// Parse the relink page size from an optional string value.
pub fn relink_page_size_from_env_value(value: Option<String>) -> AltusResult<u32> {
    parse_number("ALTUS_RELINK_PAGE_SIZE", value, DEFAULT_RELINK_PAGE_SIZE)
}

/// Parse the session idle timeout (seconds) from an optional string value.
pub fn session_idle_timeout_from_env_value(value: Option<String>) -> AltusResult<Duration> {
    parse_number(
        "ALTUS_SESSION_IDLE_TIMEOUT_SECS",
        value,
        DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
    )
    .map(Duration::from_secs)
}

/// Parse the default uploader name from an optional string value.
pub fn uploader_from_env_value(value: Option<String>) -> String {
    non_empty(value).unwrap_or_else(|| DEFAULT_UPLOADER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(root: &str, chunk_size: u64, page: u32, uploader: &str) -> AltusResult<CoreConfig> {
        CoreConfig::new(
            root,
            DEFAULT_CHUNK_THRESHOLD,
            chunk_size,
            page,
            Duration::from_secs(60),
            uploader.to_string(),
        )
    }

    #[test]
    fn test_default_config_uses_constants() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.taxonomy_root().as_str(), DEFAULT_TAXONOMY_ROOT);
        assert_eq!(cfg.chunk_threshold(), DEFAULT_CHUNK_THRESHOLD);
        assert_eq!(cfg.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.relink_page_size(), DEFAULT_RELINK_PAGE_SIZE);
        assert_eq!(cfg.uploader(), "api");
    }

    #[test]
    fn test_new_accepts_valid_values() {
        let cfg = build("/Test_Root", 1024, 50, "tester").unwrap();
        assert_eq!(cfg.taxonomy_root().as_str(), "/Test_Root");
        assert_eq!(cfg.chunk_size(), 1024);
        assert_eq!(cfg.relink_page_size(), 50);
    }

    #[test]
    fn test_new_rejects_relative_root() {
        let err = build("Test_Root", 1024, 50, "tester").unwrap_err();
        assert!(matches!(err, AltusError::Configuration(_)));
    }

    #[test]
    fn test_new_rejects_trailing_slash_root() {
        assert!(build("/Test_Root/", 1024, 50, "tester").is_err());
    }

    #[test]
    fn test_new_rejects_zero_or_oversized_chunk() {
        assert!(build("/R", 0, 50, "tester").is_err());
        assert!(build("/R", MAX_CHUNK_SIZE + 1, 50, "tester").is_err());
    }

    #[test]
    fn test_new_rejects_threshold_above_single_request_limit() {
        let limit = |threshold| {
            CoreConfig::new(
                "/R",
                threshold,
                1024,
                50,
                Duration::from_secs(60),
                "tester".into(),
            )
        };
        assert!(limit(MAX_CHUNK_SIZE).is_ok());
        assert!(matches!(
            limit(MAX_CHUNK_SIZE + 1),
            Err(AltusError::Configuration(_))
        ));
    }

    #[test]
    fn test_new_rejects_page_size_out_of_range() {
        assert!(build("/R", 1024, 0, "tester").is_err());
        assert!(build("/R", 1024, 1001, "tester").is_err());
    }

    #[test]
    fn test_new_rejects_empty_uploader() {
        assert!(build("/R", 1024, 50, "   ").is_err());
    }

    #[test]
    fn test_env_value_defaults() {
        assert_eq!(taxonomy_root_from_env_value(None), DEFAULT_TAXONOMY_ROOT);
        assert_eq!(taxonomy_root_from_env_value(Some("  ".into())), DEFAULT_TAXONOMY_ROOT);
        assert_eq!(chunk_size_from_env_value(None).unwrap(), DEFAULT_CHUNK_SIZE);
        assert_eq!(
            session_idle_timeout_from_env_value(Some("90".into())).unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(uploader_from_env_value(Some(" ops ".into())), "ops");
    }

    #[test]
    fn test_env_value_rejects_garbage() {
        let err = chunk_threshold_from_env_value(Some("lots".into())).unwrap_err();
        assert!(err.to_string().contains("ALTUS_CHUNK_THRESHOLD"));
    }
}
