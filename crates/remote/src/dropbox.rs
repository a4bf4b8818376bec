//! Dropbox implementation of [`ObjectStore`].
//!
//! Talks to the Dropbox HTTP API v2 with a long-lived refresh token. Short-lived access
//! tokens are fetched on demand and cached until shortly before they expire.
//!
//! Dropbox reports most failures as HTTP 409 with an `error_summary` such as
//! `path/conflict/folder/..` or `from_lookup/not_found/..`; [`classify`] folds those into the
//! store error taxonomy the services rely on.
//!
//! Unlike the in-memory store, `create_folder_v2` creates missing parents itself, so
//! [`StoreError::NotFound`] is never reported for a missing parent here.

use crate::error::{status_error, transport_error, RemoteResult};
use crate::required;
use altus_core::stores::{
    AccountIdentity, ObjectStore, RemoteEntry, RemoteFile, RemoteFolder, WriteMode,
};
use altus_core::{StoreError, StorePath, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Write as _;
use tokio::sync::Mutex;

pub const DEFAULT_API_BASE: &str = "https://api.dropboxapi.com";
pub const DEFAULT_CONTENT_BASE: &str = "https://content.dropboxapi.com";

/// Access tokens are treated as expired this long before Dropbox says they are.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// CREDENTIALS
// ============================================================================

/// App key, app secret and refresh token for the Dropbox app.
#[derive(Clone)]
pub struct DropboxCredentials {
    app_key: String,
    app_secret: String,
    refresh_token: String,
}

impl DropboxCredentials {
    pub fn new(app_key: String, app_secret: String, refresh_token: String) -> Self {
        Self {
            app_key,
            app_secret,
            refresh_token,
        }
    }

    /// Builds credentials from the raw `DROPBOX_APP_KEY`, `DROPBOX_APP_SECRET` and
    /// `DROPBOX_REFRESH_TOKEN` values.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RemoteError::MissingCredential`] naming the first value that is unset
    /// or blank.
    pub fn from_env_values(
        app_key: Option<String>,
        app_secret: Option<String>,
        refresh_token: Option<String>,
    ) -> RemoteResult<Self> {
        Ok(Self::new(
            required("DROPBOX_APP_KEY", app_key)?,
            required("DROPBOX_APP_SECRET", app_secret)?,
            required("DROPBOX_REFRESH_TOKEN", refresh_token)?,
        ))
    }
}

impl std::fmt::Debug for DropboxCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxCredentials")
            .field("app_key", &self.app_key)
            .finish_non_exhaustive()
    }
}

struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireFile {
    path_display: Option<String>,
    path_lower: Option<String>,
    id: Option<String>,
    rev: Option<String>,
    size: u64,
    content_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFolder {
    path_display: Option<String>,
    path_lower: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
enum WireMetadata {
    File(WireFile),
    Folder(WireFolder),
    Deleted(WireFolder),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    metadata: T,
}

#[derive(Debug, Deserialize)]
struct TemporaryLink {
    link: String,
}

#[derive(Debug, Deserialize)]
struct SessionStarted {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WireName {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAccount {
    account_id: String,
    name: Option<WireName>,
    email: Option<String>,
}

fn display_path(display: Option<String>, lower: Option<String>, requested: &StorePath) -> String {
    display
        .or(lower)
        .unwrap_or_else(|| requested.as_str().to_string())
}

fn file_from_wire(file: WireFile, requested: &StorePath) -> RemoteFile {
    RemoteFile {
        path: display_path(file.path_display, file.path_lower, requested),
        id: file.id,
        revision: file.rev,
        size: file.size,
        content_hash: file.content_hash,
    }
}

fn folder_from_wire(folder: WireFolder, requested: &StorePath) -> RemoteFolder {
    RemoteFolder {
        path: display_path(folder.path_display, folder.path_lower, requested),
        id: folder.id,
    }
}

/// Converts tagged metadata; deleted entries count as absent.
fn entry_from_wire(metadata: WireMetadata, requested: &StorePath) -> Option<RemoteEntry> {
    match metadata {
        WireMetadata::File(file) => Some(RemoteEntry::File(file_from_wire(file, requested))),
        WireMetadata::Folder(folder) => {
            Some(RemoteEntry::Folder(folder_from_wire(folder, requested)))
        }
        WireMetadata::Deleted(_) => None,
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Maps a failed Dropbox response onto a [`StoreError`].
pub fn classify(status: u16, body: &str) -> StoreError {
    if status != 409 {
        return status_error(status, body);
    }

    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let summary = parsed
        .as_ref()
        .and_then(|v| v.get("error_summary"))
        .and_then(Value::as_str)
        .unwrap_or(body)
        .to_string();

    if summary.contains("incorrect_offset") {
        if let Some(expected) = parsed.as_ref().and_then(find_correct_offset) {
            return StoreError::IncorrectOffset { expected };
        }
    }
    if summary.contains("not_found") {
        return StoreError::NotFound(summary);
    }
    if summary.contains("conflict") {
        return StoreError::Conflict(summary);
    }
    if summary.contains("too_many_write_operations") {
        return StoreError::Transient(summary);
    }
    StoreError::Rejected {
        status,
        message: summary,
    }
}

/// The offset Dropbox expected, wherever it sits in the nested error union.
fn find_correct_offset(value: &Value) -> Option<u64> {
    match value {
        Value::Object(map) => map
            .get("correct_offset")
            .and_then(Value::as_u64)
            .or_else(|| map.values().find_map(find_correct_offset)),
        _ => None,
    }
}

/// Serialises the `Dropbox-API-Arg` header value.
///
/// HTTP headers must be ASCII, so every other character is written as a JSON `\uXXXX`
/// escape (as a surrogate pair outside the basic plane).
pub fn header_safe_json(arg: &Value) -> String {
    let raw = arg.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out
}

fn commit_info(path: &StorePath, mode: WriteMode) -> Value {
    let (mode, autorename) = match mode {
        WriteMode::Overwrite => ("overwrite", false),
        WriteMode::Add => ("add", true),
    };
    json!({
        "path": path.as_str(),
        "mode": mode,
        "autorename": autorename,
        "mute": true,
    })
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if !status.is_success() {
        return Err(classify(status.as_u16(), &body));
    }
    let body = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))
}

// ============================================================================
// STORE
// ============================================================================

pub struct DropboxStore {
    client: reqwest::Client,
    credentials: DropboxCredentials,
    api_base: String,
    content_base: String,
    token: Mutex<Option<AccessToken>>,
}

impl DropboxStore {
    pub fn new(credentials: DropboxCredentials) -> RemoteResult<Self> {
        Self::with_endpoints(credentials, DEFAULT_API_BASE, DEFAULT_CONTENT_BASE)
    }

    /// Points the client at other API hosts, e.g. a local stub.
    pub fn with_endpoints(
        credentials: DropboxCredentials,
        api_base: &str,
        content_base: &str,
    ) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
            content_base: content_base.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> StoreResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(format!("{}/oauth2/token", self.api_base))
            .basic_auth(&self.credentials.app_key, Some(&self.credentials.app_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "object store token refresh failed");
            return Err(status_error(status.as_u16(), &body));
        }

        let token: TokenResponse = response.json().await.map_err(transport_error)?;
        let lifetime = (token.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);
        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
        });
        tracing::debug!(lifetime_secs = lifetime, "refreshed object store access token");
        Ok(token.access_token)
    }

    async fn rpc<T: DeserializeOwned>(&self, endpoint: &str, arg: &Value) -> StoreResult<T> {
        let token = self.access_token().await?;
        tracing::debug!(endpoint, "object store rpc");
        let response = self
            .client
            .post(format!("{}/2/{endpoint}", self.api_base))
            .bearer_auth(token)
            .json(arg)
            .send()
            .await
            .map_err(transport_error)?;
        read_response(response).await
    }

    async fn content<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        arg: &Value,
        bytes: &[u8],
    ) -> StoreResult<T> {
        let token = self.access_token().await?;
        tracing::debug!(endpoint, size = bytes.len(), "object store content upload");
        let response = self
            .client
            .post(format!("{}/2/{endpoint}", self.content_base))
            .bearer_auth(token)
            .header("Dropbox-API-Arg", header_safe_json(arg))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(transport_error)?;
        read_response(response).await
    }
}

impl std::fmt::Debug for DropboxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxStore")
            .field("api_base", &self.api_base)
            .field("content_base", &self.content_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for DropboxStore {
    async fn create_folder(&self, path: &StorePath) -> StoreResult<RemoteFolder> {
        let created: Envelope<WireFolder> = self
            .rpc(
                "files/create_folder_v2",
                &json!({ "path": path.as_str(), "autorename": false }),
            )
            .await?;
        Ok(folder_from_wire(created.metadata, path))
    }

    async fn move_path(&self, from: &StorePath, to: &StorePath) -> StoreResult<RemoteEntry> {
        let moved: Envelope<WireMetadata> = self
            .rpc(
                "files/move_v2",
                &json!({
                    "from_path": from.as_str(),
                    "to_path": to.as_str(),
                    "autorename": false,
                    "allow_ownership_transfer": false,
                }),
            )
            .await?;
        entry_from_wire(moved.metadata, to)
            .ok_or_else(|| StoreError::Decode(format!("move of {from} reported a deleted entry")))
    }

    async fn upload(
        &self,
        path: &StorePath,
        bytes: &[u8],
        mode: WriteMode,
    ) -> StoreResult<RemoteFile> {
        let file: WireFile = self
            .content("files/upload", &commit_info(path, mode), bytes)
            .await?;
        Ok(file_from_wire(file, path))
    }

    async fn upload_session_start(&self, first_chunk: &[u8]) -> StoreResult<String> {
        let started: SessionStarted = self
            .content(
                "files/upload_session/start",
                &json!({ "close": false }),
                first_chunk,
            )
            .await?;
        Ok(started.session_id)
    }

    async fn upload_session_append(
        &self,
        session_id: &str,
        offset: u64,
        chunk: &[u8],
    ) -> StoreResult<()> {
        let _: Value = self
            .content(
                "files/upload_session/append_v2",
                &json!({
                    "cursor": { "session_id": session_id, "offset": offset },
                    "close": false,
                }),
                chunk,
            )
            .await?;
        Ok(())
    }

    async fn upload_session_finish(
        &self,
        session_id: &str,
        offset: u64,
        path: &StorePath,
        mode: WriteMode,
    ) -> StoreResult<RemoteFile> {
        let file: WireFile = self
            .content(
                "files/upload_session/finish",
                &json!({
                    "cursor": { "session_id": session_id, "offset": offset },
                    "commit": commit_info(path, mode),
                }),
                &[],
            )
            .await?;
        Ok(file_from_wire(file, path))
    }

    async fn temporary_link(&self, path: &StorePath) -> StoreResult<String> {
        let link: TemporaryLink = self
            .rpc("files/get_temporary_link", &json!({ "path": path.as_str() }))
            .await?;
        Ok(link.link)
    }

    async fn metadata(&self, path: &StorePath) -> StoreResult<Option<RemoteEntry>> {
        let result: StoreResult<WireMetadata> = self
            .rpc("files/get_metadata", &json!({ "path": path.as_str() }))
            .await;
        match result {
            Ok(metadata) => Ok(entry_from_wire(metadata, path)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn account_identity(&self) -> StoreResult<AccountIdentity> {
        let account: WireAccount = self
            .rpc("users/get_current_account", &Value::Null)
            .await?;
        Ok(AccountIdentity {
            account_id: account.account_id,
            display_name: account.name.and_then(|n| n.display_name),
            email: account.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RemoteError;

    fn requested() -> StorePath {
        StorePath::parse("/Root/01_Owners/acme-1").unwrap()
    }

    #[test]
    fn test_classify_conflict_and_not_found() {
        let conflict = r#"{"error_summary": "path/conflict/folder/...", "error": {".tag": "path"}}"#;
        assert!(matches!(classify(409, conflict), StoreError::Conflict(_)));

        let missing = r#"{"error_summary": "from_lookup/not_found/..", "error": {}}"#;
        assert!(matches!(classify(409, missing), StoreError::NotFound(_)));
    }

    #[test]
    fn test_classify_incorrect_offset_reads_nested_offset() {
        let append = r#"{"error_summary": "incorrect_offset/..",
            "error": {".tag": "incorrect_offset", "correct_offset": 4096}}"#;
        assert_eq!(
            classify(409, append),
            StoreError::IncorrectOffset { expected: 4096 }
        );

        let finish = r#"{"error_summary": "lookup_failed/incorrect_offset/..",
            "error": {".tag": "lookup_failed",
                      "lookup_failed": {".tag": "incorrect_offset", "correct_offset": 12}}}"#;
        assert_eq!(
            classify(409, finish),
            StoreError::IncorrectOffset { expected: 12 }
        );
    }

    #[test]
    fn test_classify_other_statuses() {
        assert!(matches!(classify(429, "too many"), StoreError::Transient(_)));
        assert!(matches!(classify(500, ""), StoreError::Transient(_)));
        assert!(matches!(
            classify(401, "expired"),
            StoreError::Rejected { status: 401, .. }
        ));
        assert!(matches!(
            classify(409, r#"{"error_summary": "path/malformed_path/"}"#),
            StoreError::Rejected { status: 409, .. }
        ));
    }

    #[test]
    fn test_header_safe_json_escapes_non_ascii() {
        let header = header_safe_json(&json!({ "path": "/Café/résumé 📄.pdf" }));
        assert!(header.is_ascii());
        assert!(header.contains("Caf\\u00e9"));
        assert!(header.contains("\\ud83d\\udcc4"));

        let decoded: Value = serde_json::from_str(&header).unwrap();
        assert_eq!(decoded["path"], "/Café/résumé 📄.pdf");
    }

    #[test]
    fn test_wire_metadata_conversion() {
        let file: WireMetadata = serde_json::from_value(json!({
            ".tag": "file",
            "name": "lease.pdf",
            "path_lower": "/root/lease.pdf",
            "path_display": "/Root/lease.pdf",
            "id": "id:abc",
            "rev": "015f",
            "size": 42,
            "content_hash": "deadbeef"
        }))
        .unwrap();
        match entry_from_wire(file, &requested()) {
            Some(RemoteEntry::File(f)) => {
                assert_eq!(f.path, "/Root/lease.pdf");
                assert_eq!(f.revision.as_deref(), Some("015f"));
                assert_eq!(f.size, 42);
            }
            other => panic!("unexpected {other:?}"),
        }

        let deleted: WireMetadata =
            serde_json::from_value(json!({ ".tag": "deleted", "path_lower": "/gone" })).unwrap();
        assert!(entry_from_wire(deleted, &requested()).is_none());
    }

    #[test]
    fn test_folder_without_paths_falls_back_to_requested() {
        let created: Envelope<WireFolder> =
            serde_json::from_value(json!({ "metadata": { "id": "id:1" } })).unwrap();
        let folder = folder_from_wire(created.metadata, &requested());
        assert_eq!(folder.path, "/Root/01_Owners/acme-1");
    }

    #[test]
    fn test_commit_info_follows_write_mode() {
        let path = StorePath::parse("/Root/a.pdf").unwrap();

        let overwrite = commit_info(&path, WriteMode::Overwrite);
        assert_eq!(overwrite["mode"], "overwrite");
        assert_eq!(overwrite["autorename"], false);

        let add = commit_info(&path, WriteMode::Add);
        assert_eq!(add["mode"], "add");
        assert_eq!(add["autorename"], true);
        assert_eq!(add["path"], "/Root/a.pdf");
    }

    #[test]
    fn test_credentials_require_every_value() {
        let err = DropboxCredentials::from_env_values(
            Some("key".into()),
            Some("  ".into()),
            Some("refresh".into()),
        )
        .unwrap_err();
        assert!(matches!(err, RemoteError::MissingCredential("DROPBOX_APP_SECRET")));

        let creds = DropboxCredentials::from_env_values(
            Some("key".into()),
            Some("secret".into()),
            Some("refresh".into()),
        )
        .unwrap();
        let shown = format!("{creds:?}");
        assert!(shown.contains("key"));
        assert!(!shown.contains("secret"));
        assert!(!shown.contains("refresh"));
    }
}
