//! In-memory [`ObjectStore`] and [`MetadataStore`].
//!
//! Both follow the error contracts of the remote stores closely enough for the services to be
//! exercised end to end: path lookups are case-insensitive like the production object store,
//! folder creation needs an existing parent, and metadata rows get generated ids.
//!
//! Failures can be injected per path, per row id or per table to test partial-failure
//! handling.

use super::{
    compare_values, AccountIdentity, Filter, MetadataStore, ObjectStore, Query, RemoteEntry,
    RemoteFile, RemoteFolder, Row, WriteMode,
};
use crate::error::{StoreError, StoreResult};
use crate::paths::StorePath;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

// ============================================================================
// OBJECT STORE
// ============================================================================

#[derive(Debug, Clone)]
enum Node {
    Folder,
    File { bytes: Vec<u8>, revision: u64 },
}

#[derive(Debug, Clone)]
struct Stored {
    path: String,
    node: Node,
}

#[derive(Debug, Default)]
struct ObjectState {
    // Keyed by lowercased path.
    entries: BTreeMap<String, Stored>,
    sessions: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    next_revision: u64,
}

impl ObjectState {
    fn check_failure(&self, path: &StorePath) -> StoreResult<()> {
        if self.failing.contains(&key(path.as_str())) {
            return Err(StoreError::Transient(format!("injected failure at {path}")));
        }
        Ok(())
    }

    fn is_folder(&self, path: &str) -> bool {
        matches!(
            self.entries.get(&key(path)),
            Some(Stored {
                node: Node::Folder,
                ..
            })
        )
    }

    fn parent_exists(&self, path: &StorePath) -> bool {
        match path.parent() {
            Some(parent) => self.is_folder(parent.as_str()),
            None => true,
        }
    }

    // First free `stem (N).ext` beside `path`, or `path` itself when nothing is there.
    fn free_path(&self, path: &StorePath) -> StoreResult<StorePath> {
        if !self.entries.contains_key(&key(path.as_str())) {
            return Ok(path.clone());
        }
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::Conflict(path.to_string()))?;
        let name = path.file_name();
        let (stem, ext) = match name.rfind('.') {
            Some(idx) if idx > 0 => name.split_at(idx),
            _ => (name, ""),
        };
        (1u32..)
            .map(|n| parent.join(&format!("{stem} ({n}){ext}")))
            .find(|candidate| !self.entries.contains_key(&key(candidate.as_str())))
            .ok_or_else(|| StoreError::Conflict(path.to_string()))
    }

    fn write(&mut self, path: &StorePath, bytes: Vec<u8>, mode: WriteMode) -> StoreResult<RemoteFile> {
        let dest = match mode {
            WriteMode::Overwrite => path.clone(),
            WriteMode::Add => self.free_path(path)?,
        };
        self.write_file(&dest, bytes)
    }

    // The production store creates missing parents when a file is written.
    fn write_file(&mut self, path: &StorePath, bytes: Vec<u8>) -> StoreResult<RemoteFile> {
        if self.is_folder(path.as_str()) {
            return Err(StoreError::Conflict(path.to_string()));
        }

        let mut ancestor = path.parent();
        while let Some(folder) = ancestor {
            self.entries
                .entry(key(folder.as_str()))
                .or_insert_with(|| Stored {
                    path: folder.to_string(),
                    node: Node::Folder,
                });
            ancestor = folder.parent();
        }

        self.next_revision += 1;
        let revision = self.next_revision;
        let size = bytes.len() as u64;
        self.entries.insert(
            key(path.as_str()),
            Stored {
                path: path.to_string(),
                node: Node::File { bytes, revision },
            },
        );

        Ok(RemoteFile {
            path: path.to_string(),
            id: Some(format!("id:{revision}")),
            revision: Some(format!("{revision:09x}")),
            size,
            content_hash: None,
        })
    }
}

fn key(path: &str) -> String {
    path.to_lowercase()
}

fn entry_of(stored: &Stored) -> RemoteEntry {
    match &stored.node {
        Node::Folder => RemoteEntry::Folder(RemoteFolder {
            path: stored.path.clone(),
            id: None,
        }),
        Node::File { bytes, revision } => RemoteEntry::File(RemoteFile {
            path: stored.path.clone(),
            id: Some(format!("id:{revision}")),
            revision: Some(format!("{revision:09x}")),
            size: bytes.len() as u64,
            content_hash: None,
        }),
    }
}

/// Object store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    state: Mutex<ObjectState>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation touching `path` fail with a transient error.
    pub fn fail_on(&self, path: &str) {
        self.state.lock().failing.insert(key(path));
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().entries.contains_key(&key(path))
    }

    pub fn is_folder(&self, path: &str) -> bool {
        self.state.lock().is_folder(path)
    }

    pub fn file_bytes(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().entries.get(&key(path)) {
            Some(Stored {
                node: Node::File { bytes, .. },
                ..
            }) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Every stored path, sorted case-insensitively.
    pub fn paths(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .values()
            .map(|stored| stored.path.clone())
            .collect()
    }

    /// Number of upload sessions opened but not yet finished.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_folder(&self, path: &StorePath) -> StoreResult<RemoteFolder> {
        let mut state = self.state.lock();
        state.check_failure(path)?;

        if state.entries.contains_key(&key(path.as_str())) {
            return Err(StoreError::Conflict(path.to_string()));
        }
        if !state.parent_exists(path) {
            let parent = path.parent().map(|p| p.to_string()).unwrap_or_default();
            return Err(StoreError::NotFound(parent));
        }

        state.entries.insert(
            key(path.as_str()),
            Stored {
                path: path.to_string(),
                node: Node::Folder,
            },
        );
        Ok(RemoteFolder {
            path: path.to_string(),
            id: None,
        })
    }

    async fn move_path(&self, from: &StorePath, to: &StorePath) -> StoreResult<RemoteEntry> {
        let mut state = self.state.lock();
        state.check_failure(from)?;
        state.check_failure(to)?;

        let from_key = key(from.as_str());
        if !state.entries.contains_key(&from_key) {
            return Err(StoreError::NotFound(from.to_string()));
        }
        if state.entries.contains_key(&key(to.as_str())) {
            return Err(StoreError::Conflict(to.to_string()));
        }
        if to.is_within(from) {
            return Err(StoreError::Rejected {
                status: 409,
                message: "cannot move a folder into itself".into(),
            });
        }
        if !state.parent_exists(to) {
            let parent = to.parent().map(|p| p.to_string()).unwrap_or_default();
            return Err(StoreError::NotFound(parent));
        }

        let subtree_prefix = format!("{from_key}/");
        let moved_keys: Vec<String> = state
            .entries
            .keys()
            .filter(|k| **k == from_key || k.starts_with(&subtree_prefix))
            .cloned()
            .collect();

        for old_key in moved_keys {
            if let Some(mut stored) = state.entries.remove(&old_key) {
                let rest = stored.path.get(from.as_str().len()..).unwrap_or_default();
                stored.path = format!("{to}{rest}");
                state.entries.insert(key(&stored.path), stored);
            }
        }

        state
            .entries
            .get(&key(to.as_str()))
            .map(entry_of)
            .ok_or_else(|| StoreError::NotFound(to.to_string()))
    }

    async fn upload(
        &self,
        path: &StorePath,
        bytes: &[u8],
        mode: WriteMode,
    ) -> StoreResult<RemoteFile> {
        let mut state = self.state.lock();
        state.check_failure(path)?;
        state.write(path, bytes.to_vec(), mode)
    }

    async fn upload_session_start(&self, first_chunk: &[u8]) -> StoreResult<String> {
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        self.state
            .lock()
            .sessions
            .insert(session_id.clone(), first_chunk.to_vec());
        Ok(session_id)
    }

    async fn upload_session_append(
        &self,
        session_id: &str,
        offset: u64,
        chunk: &[u8],
    ) -> StoreResult<()> {
        let mut state = self.state.lock();
        let buffer = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("upload session {session_id}")))?;

        let expected = buffer.len() as u64;
        if offset != expected {
            return Err(StoreError::IncorrectOffset { expected });
        }
        buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn upload_session_finish(
        &self,
        session_id: &str,
        offset: u64,
        path: &StorePath,
        mode: WriteMode,
    ) -> StoreResult<RemoteFile> {
        let mut state = self.state.lock();
        state.check_failure(path)?;

        let expected = state
            .sessions
            .get(session_id)
            .map(|buffer| buffer.len() as u64)
            .ok_or_else(|| StoreError::NotFound(format!("upload session {session_id}")))?;
        if offset != expected {
            return Err(StoreError::IncorrectOffset { expected });
        }

        let bytes = state.sessions.remove(session_id).unwrap_or_default();
        state.write(path, bytes, mode)
    }

    async fn temporary_link(&self, path: &StorePath) -> StoreResult<String> {
        let state = self.state.lock();
        state.check_failure(path)?;
        match state.entries.get(&key(path.as_str())) {
            Some(Stored {
                node: Node::File { revision, .. },
                ..
            }) => Ok(format!("memory://{}?rev={revision}", path.as_str().trim_start_matches('/'))),
            Some(_) => Err(StoreError::Rejected {
                status: 409,
                message: format!("{path} is a folder"),
            }),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn metadata(&self, path: &StorePath) -> StoreResult<Option<RemoteEntry>> {
        let state = self.state.lock();
        state.check_failure(path)?;
        Ok(state.entries.get(&key(path.as_str())).map(entry_of))
    }

    async fn account_identity(&self) -> StoreResult<AccountIdentity> {
        Ok(AccountIdentity {
            account_id: "memory".into(),
            display_name: Some("In-memory object store".into()),
            email: None,
        })
    }
}

// ============================================================================
// METADATA STORE
// ============================================================================

#[derive(Debug, Default)]
struct MetadataState {
    tables: HashMap<String, Vec<Row>>,
    next_ids: HashMap<String, i64>,
    failing_patch_ids: HashSet<i64>,
    failing_insert_tables: HashSet<String>,
    unavailable: bool,
}

impl MetadataState {
    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::Transient("metadata store unavailable".into()));
        }
        Ok(())
    }
}

fn row_id(row: &Row) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

/// Metadata store held in process memory.
///
/// Rows inserted without an `id` get the next integer id for their table, starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    state: Mutex<MetadataState>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes any patch touching the row with this id fail with a transient error.
    pub fn fail_patch_for_id(&self, id: i64) {
        self.state.lock().failing_patch_ids.insert(id);
    }

    pub fn clear_patch_failures(&self) {
        self.state.lock().failing_patch_ids.clear();
    }

    /// Makes every insert into `table` fail with a transient error.
    pub fn fail_inserts_into(&self, table: &str) {
        self.state.lock().failing_insert_tables.insert(table.to_string());
    }

    /// Makes every call fail, as if the store could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Snapshot of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Row>> {
        let state = self.state.lock();
        state.check_available()?;

        let mut rows: Vec<Row> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(column) = &query.order_by {
            rows.sort_by(|a, b| {
                let a = a.get(column).unwrap_or(&Value::Null);
                let b = b.get(column).unwrap_or(&Value::Null);
                compare_values(a, b).unwrap_or(Ordering::Equal)
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> StoreResult<Row> {
        let mut state = self.state.lock();
        state.check_available()?;
        if state.failing_insert_tables.contains(table) {
            return Err(StoreError::Transient(format!("injected insert failure on {table}")));
        }

        let next = state.next_ids.entry(table.to_string()).or_insert(1);
        let id = match row_id(&row) {
            Some(id) => {
                *next = (*next).max(id + 1);
                id
            }
            None => {
                let id = *next;
                *next += 1;
                id
            }
        };
        row.insert("id".into(), Value::from(id));

        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn patch(&self, table: &str, filters: &[Filter], fields: Row) -> StoreResult<usize> {
        let mut state = self.state.lock();
        state.check_available()?;

        let failing = state.failing_patch_ids.clone();
        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(0);
        };

        let matching: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| filters.iter().all(|f| f.matches(row)))
            .map(|(idx, _)| idx)
            .collect();

        if let Some(id) = matching
            .iter()
            .filter_map(|idx| row_id(&rows[*idx]))
            .find(|id| failing.contains(id))
        {
            return Err(StoreError::Transient(format!(
                "injected patch failure for {table} row {id}"
            )));
        }

        for idx in &matching {
            for (column, value) in &fields {
                rows[*idx].insert(column.clone(), value.clone());
            }
        }
        Ok(matching.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_create_folder_conflict_and_missing_parent() {
        let store = InMemoryObjectStore::new();
        store.create_folder(&p("/R")).await.unwrap();

        assert!(matches!(
            store.create_folder(&p("/r")).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.create_folder(&p("/R/a/b")).await,
            Err(StoreError::NotFound(parent)) if parent == "/R/a"
        ));
    }

    #[tokio::test]
    async fn test_move_renames_subtree() {
        let store = InMemoryObjectStore::new();
        for path in ["/R", "/R/a", "/R/a/x", "/R/b"] {
            store.create_folder(&p(path)).await.unwrap();
        }
        store
            .upload(&p("/R/a/x/f.txt"), b"hi", WriteMode::Overwrite)
            .await.unwrap();

        store.move_path(&p("/R/a"), &p("/R/b/a")).await.unwrap();

        assert!(!store.exists("/R/a"));
        assert!(store.is_folder("/R/b/a/x"));
        assert_eq!(store.file_bytes("/R/b/a/x/f.txt").unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_move_reports_conflict_and_missing_source() {
        let store = InMemoryObjectStore::new();
        for path in ["/R", "/R/a", "/R/b"] {
            store.create_folder(&p(path)).await.unwrap();
        }
        assert!(matches!(
            store.move_path(&p("/R/a"), &p("/R/b")).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.move_path(&p("/R/zz"), &p("/R/c")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_session_rejects_wrong_offset() {
        let store = InMemoryObjectStore::new();
        let id = store.upload_session_start(b"abc").await.unwrap();

        assert_eq!(
            store.upload_session_append(&id, 2, b"def").await,
            Err(StoreError::IncorrectOffset { expected: 3 })
        );
        store.upload_session_append(&id, 3, b"def").await.unwrap();
        store
            .upload_session_finish(&id, 6, &p("/R/f.bin"), WriteMode::Overwrite)
            .await
            .unwrap();

        assert_eq!(store.file_bytes("/R/f.bin").unwrap(), b"abcdef");
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_add_mode_renames_instead_of_overwriting() {
        let store = InMemoryObjectStore::new();
        store.create_folder(&p("/R")).await.unwrap();
        store
            .upload(&p("/R/scan.pdf"), b"one", WriteMode::Add)
            .await
            .unwrap();

        let second = store
            .upload(&p("/R/SCAN.pdf"), b"two", WriteMode::Add)
            .await
            .unwrap();
        assert_eq!(second.path, "/R/SCAN (1).pdf");

        let id = store.upload_session_start(b"three").await.unwrap();
        let third = store
            .upload_session_finish(&id, 5, &p("/R/scan.pdf"), WriteMode::Add)
            .await
            .unwrap();
        assert_eq!(third.path, "/R/scan (2).pdf");

        assert_eq!(store.file_bytes("/R/scan.pdf").unwrap(), b"one");
        assert_eq!(store.file_bytes("/R/scan (1).pdf").unwrap(), b"two");

        store
            .upload(&p("/R/scan.pdf"), b"four", WriteMode::Overwrite)
            .await
            .unwrap();
        assert_eq!(store.file_bytes("/R/scan.pdf").unwrap(), b"four");
    }

    #[tokio::test]
    async fn test_metadata_insert_select_patch() {
        let store = InMemoryMetadataStore::new();
        for path in ["/A/1", "/A/2", "/B/3"] {
            let row = json!({"stored_path": path}).as_object().cloned().unwrap();
            store.insert("file_assets", row).await.unwrap();
        }

        let query = Query::new().starts_with("stored_path", "/A/").order_by("id").limit(1);
        let rows = store.select("file_assets", &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));

        let fields = json!({"stored_path": "/C/1"}).as_object().cloned().unwrap();
        let changed = store
            .patch("file_assets", &[Filter::Eq("id".into(), json!(1))], fields)
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(store.rows("file_assets")[0]["stored_path"], json!("/C/1"));
    }

    #[tokio::test]
    async fn test_metadata_injected_failures() {
        let store = InMemoryMetadataStore::new();
        let row = json!({"x": 1}).as_object().cloned().unwrap();
        let stored = store.insert("t", row).await.unwrap();
        let id = stored["id"].as_i64().unwrap();

        store.fail_patch_for_id(id);
        let fields = json!({"x": 2}).as_object().cloned().unwrap();
        assert!(store
            .patch("t", &[Filter::Eq("id".into(), json!(id))], fields)
            .await
            .is_err());

        store.fail_inserts_into("t");
        assert!(store.insert("t", Row::new()).await.is_err());
    }
}
