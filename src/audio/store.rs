use dashmap::DashMap;
use tracing::debug;

use super::session::{Session, SessionKey};

/// Session Queue Store: one [`Session`] per voice room.
///
/// Every operation runs under the map's per-entry lock and completes
/// synchronously, so readers never observe a half-applied change. Nothing
/// here may be called while awaiting.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionKey, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing session, or a fresh `Idle` one with an empty queue.
    pub fn get_or_create(&self, key: SessionKey) -> Session {
        self.sessions
            .entry(key)
            .or_insert_with(|| {
                debug!("🆕 Session created for {}", key);
                Session::new()
            })
            .clone()
    }

    /// Deletes the session; a no-op when absent.
    pub fn remove(&self, key: SessionKey) -> Option<Session> {
        self.sessions.remove(&key).map(|(_, session)| session)
    }

    /// Point-in-time copy for read-only callers.
    pub fn snapshot(&self, key: SessionKey) -> Option<Session> {
        self.sessions.get(&key).map(|s| s.clone())
    }

    /// Applies `f` to the session atomically. `None` if the session is absent.
    pub fn update<R>(&self, key: SessionKey, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.get_mut(&key).map(|mut s| f(&mut s))
    }

    pub fn contains(&self, key: SessionKey) -> bool {
        self.sessions.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
