//! Live sessions keyed by id.

use crate::accounts::UserRecord;
use crate::core::packet::Packet;
use crate::session::{Session, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tracing::debug;

/// Returned when the registry is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimitReached;

/// Thread-safe set of connected sessions
#[derive(Debug)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    next: AtomicU64,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next: AtomicU64::new(1),
            max_connections,
        }
    }

    pub fn next_id(&self) -> SessionId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, session: Arc<Session>) -> Result<(), ConnectionLimitReached> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.len() >= self.max_connections {
            return Err(ConnectionLimitReached);
        }
        sessions.insert(session.id(), session);
        Ok(())
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.read().values().cloned().collect()
    }

    /// Sessions that completed the handshake, with their user records
    pub fn authenticated(&self) -> Vec<(Arc<Session>, UserRecord)> {
        self.read()
            .values()
            .filter_map(|session| session.user().map(|user| (Arc::clone(session), user)))
            .collect()
    }

    /// Live sessions logged in as exactly `username`
    pub fn find_by_username(&self, username: &str) -> Vec<Arc<Session>> {
        self.read()
            .values()
            .filter(|session| session.username().as_deref() == Some(username))
            .cloned()
            .collect()
    }

    /// Log `session` in as `user`, evicting every other session that holds
    /// the same username.
    ///
    /// The check, the evictions and the claim happen under one write lock, so
    /// at most one registered session ever carries a given username. Evicted
    /// sessions leave the registry immediately and are returned so the caller
    /// can notify and close them. Returns `None` when `session` itself is no
    /// longer registered.
    pub fn claim_username(&self, session: &Arc<Session>, user: UserRecord) -> Option<Vec<Arc<Session>>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if !sessions.contains_key(&session.id()) {
            return None;
        }

        let holders: Vec<SessionId> = sessions
            .values()
            .filter(|other| other.id() != session.id())
            .filter(|other| other.username().as_deref() == Some(user.username.as_str()))
            .map(|other| other.id())
            .collect();
        let evicted = holders.iter().filter_map(|id| sessions.remove(id)).collect();

        session.set_user(user);
        Some(evicted)
    }

    pub fn player_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .values()
            .filter_map(|session| session.username())
            .collect();
        names.sort();
        names
    }

    /// Queue `packet` on every authenticated session. Returns how many accepted it.
    pub fn broadcast(&self, packet: &Packet) -> usize {
        let mut delivered = 0;
        for (session, _) in self.authenticated() {
            match session.send(packet.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(session = session.id(), error = %e, "Broadcast skipped closed session"),
            }
        }
        delivered
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }
}
