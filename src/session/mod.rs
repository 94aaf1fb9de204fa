//! Process-wide session registry.
//!
//! Built once at startup and passed to every transport. A single
//! `RwLock` guards the id map, so a lookup never observes a half-created or
//! half-removed entry. Removed ids are retired and never handed out again.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use rand::RngCore;

use crate::error::{GateError, Result};
use crate::types::*;

const SESSION_ID_BYTES: usize = 16;

/// Opaque, unpredictable session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-caller session state.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    last_active_at: Mutex<DateTime<Utc>>,
    closed: AtomicBool,
    calls: Mutex<()>,
}

pub type SessionHandle = Arc<Session>;

impl Session {
    fn new(id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            last_active_at: Mutex::new(now),
            closed: AtomicBool::new(false),
            calls: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        *self.last_active_at.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Record activity on the session.
    pub fn touch(&self) {
        *self.last_active_at.lock() = Utc::now();
    }

    /// Serialise call execution within this session. The returned guard
    /// holds the session's call lock until dropped.
    pub fn enter(&self) -> MutexGuard<'_, ()> {
        self.calls.lock()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn idle_since(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_active_at()
    }
}

#[derive(Default)]
struct RegistryState {
    live: HashMap<SessionId, SessionHandle>,
    retired: HashSet<SessionId>,
}

/// Authoritative mapping from session id to session handle.
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
    idle_timeout: Option<Duration>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// A registry whose sessions never expire from idleness.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(idle_timeout: Option<Duration>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Register a new open session and return its id.
    pub fn create(&self) -> SessionId {
        self.create_handle().id().clone()
    }

    /// Register a new open session and return its handle. Never goes
    /// through lookup, so the new session is usable regardless of expiry.
    pub fn create_handle(&self) -> SessionHandle {
        let now = Utc::now();
        let mut state = self.state.write();
        let id = loop {
            let candidate = generate_session_id();
            if !state.live.contains_key(&candidate) && !state.retired.contains(&candidate) {
                break candidate;
            }
            tracing::warn!("session id collision, regenerating");
        };
        let session = Arc::new(Session::new(id.clone(), now));
        state.live.insert(id.clone(), session.clone());
        drop(state);

        tracing::debug!(session = %id, "session created");
        session
    }

    /// Resolve a session. Read-only: an idle-expired entry is reported as
    /// not found but left for [`sweep_expired`](Self::sweep_expired).
    pub fn lookup(&self, id: &str) -> Result<SessionHandle> {
        self.lookup_at(id, Utc::now())
    }

    pub fn lookup_at(&self, id: &str, now: DateTime<Utc>) -> Result<SessionHandle> {
        let state = self.state.read();
        let handle = state
            .live
            .get(&SessionId::from(id))
            .filter(|s| !s.is_closed() && !self.is_expired(s, now))
            .cloned();
        drop(state);

        handle.ok_or_else(|| {
            tracing::debug!(session = id, "session lookup miss");
            GateError::SessionNotFound(id.to_string())
        })
    }

    /// Remove a session. Removing an absent id is a no-op.
    /// Returns whether a live session was removed.
    pub fn remove(&self, id: &str) -> bool {
        let key = SessionId::from(id);
        let mut state = self.state.write();
        let removed = state.live.remove(&key);
        if let Some(session) = &removed {
            session.close();
            state.retired.insert(key);
        }
        drop(state);

        if removed.is_some() {
            tracing::debug!(session = id, "session ended");
        }
        removed.is_some()
    }

    /// Remove every session idle past the timeout. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        if self.idle_timeout.is_none() {
            return 0;
        }
        let mut state = self.state.write();
        let expired: Vec<SessionId> = state
            .live
            .values()
            .filter(|s| self.is_expired(s, now))
            .map(|s| s.id().clone())
            .collect();
        for id in &expired {
            if let Some(session) = state.live.remove(id) {
                session.close();
            }
            state.retired.insert(id.clone());
        }
        drop(state);

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired idle sessions");
        }
        expired.len()
    }

    /// Close and drop every session. Used at shutdown.
    pub fn close_all(&self) -> usize {
        let mut state = self.state.write();
        let sessions: Vec<SessionHandle> = state.live.drain().map(|(_, s)| s).collect();
        for session in &sessions {
            session.close();
            state.retired.insert(session.id().clone());
        }
        sessions.len()
    }

    pub fn len(&self) -> usize {
        self.state.read().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        self.idle_timeout
            .map(|timeout| session.idle_since(now) > timeout)
            .unwrap_or(false)
    }
}

/// Generate an unpredictable session id (128 random bits, hex).
pub fn generate_session_id() -> SessionId {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    SessionId(hex::encode(bytes))
}

/// Parse a duration string like "1h", "30m", "7d".
pub fn parse_ttl(s: &str) -> Result<Duration> {
    let duration: std::time::Duration = humantime::parse_duration(s)
        .map_err(|e| GateError::Config(format!("Invalid duration '{}': {}", s, e)))?;
    Duration::from_std(duration)
        .map_err(|e| GateError::Config(format!("Duration out of range: {}", e)))
}
