//! In-memory session storage for transport shells.

use super::{LatestStatus, Session};
use dashmap::DashMap;
use uuid::Uuid;

/// Sessions keyed by id.
///
/// A shell checks a session out for the duration of one orchestrator call
/// and commits it back afterwards, so no map guard is held across an await.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new empty session and returns its id.
    pub fn create(&self) -> Uuid {
        let session = Session::new();
        let id = session.id();
        self.sessions.insert(id, session);
        id
    }

    /// Takes a session out of the store, creating it if unknown.
    pub fn checkout(&self, id: Uuid) -> Session {
        self.sessions
            .remove(&id)
            .map_or_else(|| Session::with_id(id), |(_, session)| session)
    }

    /// Puts a session back.
    pub fn commit(&self, session: Session) {
        self.sessions.insert(session.id(), session);
    }

    /// Status of a session, if it exists.
    #[must_use]
    pub fn latest_status(&self, id: Uuid) -> Option<LatestStatus> {
        self.sessions.get(&id).map(|s| s.latest_status())
    }

    /// Ends a session.
    pub fn remove(&self, id: Uuid) -> Option<Session> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
