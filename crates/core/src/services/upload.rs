//! Upload session state machine.
//!
//! Small payloads go to the object store in one request. Larger payloads are streamed
//! through an upload session:
//!
//! ```text
//! start(first chunk) ──► Active{offset} ──append──► Active{offset'} ──finish──► Finished
//!                           │
//!                           └── remote error or idle timeout ──► Abandoned
//! ```
//!
//! Appends are strictly sequential. The caller passes the offset it was last given. A
//! mismatch is rejected before anything is sent and leaves the session `Active`, so the
//! caller can resume from the correct offset. Session state lives only in this process; the
//! object store owns the session's real lifetime, and there is no cancel operation.

use crate::config::CoreConfig;
use crate::paths::StorePath;
use crate::stores::{RemoteFile, Stores, WriteMode};
use crate::{AltusError, AltusResult};
use altus_files::ChunkPlan;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of one upload session.
///
/// A session that has not been started has no id and is not tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    Active { offset: u64 },
    Finished { path: String, revision: Option<String> },
    Abandoned { reason: String },
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadState::Active { .. } => f.write_str("active"),
            UploadState::Finished { .. } => f.write_str("finished"),
            UploadState::Abandoned { .. } => f.write_str("abandoned"),
        }
    }
}

/// Session id and the offset the next append must use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCursor {
    pub session_id: String,
    pub offset: u64,
}

#[derive(Debug)]
struct SessionEntry {
    state: UploadState,
    last_activity: DateTime<Utc>,
    in_flight: bool,
}

/// Tracks upload sessions and drives single-shot or chunked uploads.
#[derive(Debug)]
pub struct UploadSessionManager {
    cfg: Arc<CoreConfig>,
    stores: Stores,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl UploadSessionManager {
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self {
            cfg,
            stores,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Writes `bytes` to `dest`. An existing file is handled according to `mode`; the
    /// returned file carries the path actually written.
    ///
    /// Payloads no larger than the configured threshold are sent in one request; anything
    /// larger goes through a session in chunks of the configured size.
    pub async fn upload(
        &self,
        dest: &StorePath,
        bytes: &[u8],
        mode: WriteMode,
    ) -> AltusResult<RemoteFile> {
        if bytes.len() as u64 <= self.cfg.chunk_threshold() {
            return Ok(self.stores.objects.upload(dest, bytes, mode).await?);
        }

        let plan = ChunkPlan::new(bytes.len(), self.cfg.chunk_size())?;
        let mut spans = plan.spans().iter();
        let first = spans.next().cloned().unwrap_or(0..0);

        let mut cursor = self.start(&bytes[first]).await?;
        for span in spans {
            cursor.offset = self
                .append(&cursor.session_id, cursor.offset, &bytes[span.clone()])
                .await?;
        }

        tracing::info!(
            path = %dest,
            chunks = plan.len(),
            size = bytes.len(),
            "finishing chunked upload"
        );
        self.finish(&cursor.session_id, cursor.offset, dest, mode)
            .await
    }

    /// Opens a session with its first chunk.
    pub async fn start(&self, first_chunk: &[u8]) -> AltusResult<UploadCursor> {
        let session_id = self
            .stores
            .objects
            .upload_session_start(first_chunk)
            .await?;
        let offset = first_chunk.len() as u64;

        self.sessions.lock().insert(
            session_id.clone(),
            SessionEntry {
                state: UploadState::Active { offset },
                last_activity: Utc::now(),
                in_flight: false,
            },
        );
        Ok(UploadCursor { session_id, offset })
    }

    /// Appends `chunk` at `offset` and returns the offset for the next call.
    ///
    /// # Errors
    ///
    /// - [`AltusError::OffsetMismatch`] if `offset` is not the session's current offset. The
    ///   session stays active.
    /// - [`AltusError::UnknownSession`], [`AltusError::SessionNotActive`] or
    ///   [`AltusError::SessionBusy`] if the session cannot take an append now.
    /// - [`AltusError::Store`] if the store rejects the chunk. The session is abandoned.
    ///
    /// If the returned future is dropped before it completes, the session stays active at
    /// `offset` and takes the same append again.
    pub async fn append(&self, session_id: &str, offset: u64, chunk: &[u8]) -> AltusResult<u64> {
        let claim = self.claim(session_id, offset)?;

        let result = self
            .stores
            .objects
            .upload_session_append(session_id, offset, chunk)
            .await;

        let next = offset + chunk.len() as u64;
        self.settle(claim, result.map(|()| UploadState::Active { offset: next }))?;
        Ok(next)
    }

    /// Commits the session's bytes to `dest`, handling an existing file according to `mode`.
    pub async fn finish(
        &self,
        session_id: &str,
        offset: u64,
        dest: &StorePath,
        mode: WriteMode,
    ) -> AltusResult<RemoteFile> {
        let claim = self.claim(session_id, offset)?;

        let result = self
            .stores
            .objects
            .upload_session_finish(session_id, offset, dest, mode)
            .await;

        let outcome = result
            .as_ref()
            .map(|file| UploadState::Finished {
                path: file.path.clone(),
                revision: file.revision.clone(),
            })
            .map_err(Clone::clone);
        self.settle(claim, outcome)?;
        Ok(result?)
    }

    /// Current state of a session, or `None` if it is not tracked.
    pub fn state(&self, session_id: &str) -> Option<UploadState> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|entry| entry.state.clone())
    }

    /// Abandons active sessions idle for longer than the configured timeout and forgets
    /// finished or abandoned ones past the same timeout.
    ///
    /// Returns the ids of sessions abandoned by this sweep.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let timeout = self.cfg.session_idle_timeout();
        let mut sessions = self.sessions.lock();
        let mut abandoned = Vec::new();

        sessions.retain(|session_id, entry| {
            let idle = now
                .signed_duration_since(entry.last_activity)
                .to_std()
                .is_ok_and(|elapsed| elapsed > timeout);
            if !matches!(entry.state, UploadState::Active { .. }) {
                return !idle;
            }
            if idle {
                tracing::warn!(session_id = %session_id, "abandoning idle upload session");
                entry.state = UploadState::Abandoned {
                    reason: "idle timeout".into(),
                };
                entry.last_activity = now;
                entry.in_flight = false;
                abandoned.push(session_id.clone());
            }
            true
        });
        abandoned
    }

    // Checks the session can take a request at `offset` and marks it in flight.
    fn claim<'a>(&'a self, session_id: &'a str, offset: u64) -> AltusResult<InFlight<'a>> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| AltusError::UnknownSession(session_id.to_string()))?;

        let UploadState::Active { offset: expected } = entry.state else {
            return Err(AltusError::SessionNotActive {
                session_id: session_id.to_string(),
                state: entry.state.to_string(),
            });
        };
        if entry.in_flight {
            return Err(AltusError::SessionBusy(session_id.to_string()));
        }
        if offset != expected {
            return Err(AltusError::OffsetMismatch {
                session_id: session_id.to_string(),
                expected,
                actual: offset,
            });
        }

        entry.in_flight = true;
        Ok(InFlight {
            sessions: &self.sessions,
            session_id,
            armed: true,
        })
    }

    // Records the outcome of a claimed request.
    fn settle(
        &self,
        mut claim: InFlight<'_>,
        outcome: crate::StoreResult<UploadState>,
    ) -> AltusResult<()> {
        claim.armed = false;
        let session_id = claim.session_id;
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| AltusError::UnknownSession(session_id.to_string()))?;
        entry.in_flight = false;
        entry.last_activity = Utc::now();

        match outcome {
            Ok(state) => {
                entry.state = state;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "abandoning upload session");
                entry.state = UploadState::Abandoned {
                    reason: e.to_string(),
                };
                Err(e.into())
            }
        }
    }
}

// In-flight mark of a claimed session. Dropping it unsettled clears the mark.
struct InFlight<'a> {
    sessions: &'a Mutex<HashMap<String, SessionEntry>>,
    session_id: &'a str,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(entry) = self.sessions.lock().get_mut(self.session_id) {
            tracing::debug!(session_id = %self.session_id, "releasing cancelled session request");
            entry.in_flight = false;
        }
    }
}
