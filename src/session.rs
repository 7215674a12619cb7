//! Session table: a thread-safe mapping from session id to session
//! record, with lookup/insert/remove.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{GatewayError, GatewayErrorCode};
use crate::event::EventQueue;
use crate::handle::{Handle, HandleId, HandleTable};
use crate::ids::draw_unique_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `alive -> destroying -> gone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Alive,
    Destroying,
}

/// A gateway-side client context that may contain multiple handles.
pub struct Session {
    id: SessionId,
    events: Arc<EventQueue>,
    handles: std::sync::Mutex<HandleTable>,
    destroying: AtomicBool,
    last_activity: AtomicU64,
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Session {
    fn new(id: SessionId) -> Arc<Self> {
        Arc::new(Self {
            id,
            events: EventQueue::new(),
            handles: std::sync::Mutex::new(HandleTable::new()),
            destroying: AtomicBool::new(false),
            last_activity: AtomicU64::new(now_unix_secs()),
        })
    }

    /// Records activity against this session so the idle reaper doesn't
    /// sweep it. Called on every request scoped to this session, including
    /// long polls.
    pub fn touch(&self) {
        self.last_activity.store(now_unix_secs(), Ordering::Release);
    }

    /// Seconds since this session last saw activity.
    pub fn idle_for_secs(&self) -> u64 {
        now_unix_secs().saturating_sub(self.last_activity.load(Ordering::Acquire))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn events(&self) -> &Arc<EventQueue> {
        &self.events
    }

    pub fn state(&self) -> SessionState {
        if self.destroying.load(Ordering::Acquire) {
            SessionState::Destroying
        } else {
            SessionState::Alive
        }
    }

    pub fn mark_destroying(&self) {
        self.destroying.store(true, Ordering::Release);
    }

    pub fn handles(&self) -> std::sync::MutexGuard<'_, HandleTable> {
        self.handles.lock().expect("handle table mutex poisoned")
    }

    pub fn handle(&self, handle_id: HandleId) -> Option<Arc<Handle>> {
        self.handles().get(handle_id)
    }
}

/// The session table: a single lock covering lookup/insert/remove only,
/// kept as a short critical section.
#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a session with a freshly drawn, non-colliding id.
    pub fn create(&self) -> Arc<Session> {
        let mut sessions = self.sessions.write().expect("session table lock poisoned");
        let id = SessionId::new(draw_unique_id(|candidate| {
            sessions.contains_key(&SessionId::new(candidate))
        }));
        let session = Session::new(id);
        sessions.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: SessionId) -> Result<Arc<Session>, GatewayError> {
        self.sessions
            .read()
            .expect("session table lock poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::new(GatewayErrorCode::SessionNotFound))
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().expect("session table lock poisoned").contains_key(&id)
    }

    /// Removes the session from the table. Returns it so the caller can
    /// finish tearing it down (detaching handles) outside the table lock.
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().expect("session table lock poisoned").remove(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().expect("session table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of every live session, used by the idle-session reaper
    /// (`supervisor::spawn_session_reaper`). Cloning the `Arc`s keeps the
    /// table lock held only for the snapshot itself.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().expect("session table lock poisoned").values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_destroy_leaves_table_unchanged() {
        let table = SessionTable::new();
        let before = table.len();

        let session = table.create();
        assert!(table.contains(session.id()));

        table.remove(session.id());
        assert_eq!(table.len(), before);
    }

    #[test]
    fn created_session_ids_are_positive_and_unique() {
        let table = SessionTable::new();
        let a = table.create();
        let b = table.create();
        assert!(a.id().value() >= 1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn lookup_of_missing_session_is_session_not_found() {
        let table = SessionTable::new();
        let err = table.get(SessionId::new(12345)).unwrap_err();
        assert_eq!(err.code(), GatewayErrorCode::SessionNotFound);
    }
}
