use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::party::PartyEndpoint;

/// An opaque token identifying a live session with one party's proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps each party endpoint to its live session.
///
/// There is at most one session per endpoint. The store is owned by an
/// [Aggregator](crate::Aggregator), which resets it at the start of every
/// connection round, and only ever mutates it from one place at a time.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: HashMap<PartyEndpoint, SessionId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every session.
    pub fn reset(&mut self) {
        self.sessions.clear();
    }

    /// Record the session for an endpoint, replacing any previous one.
    pub fn store(&mut self, endpoint: PartyEndpoint, session: SessionId) {
        self.sessions.insert(endpoint, session);
    }

    pub fn exists(&self, endpoint: &PartyEndpoint) -> bool {
        self.sessions.contains_key(endpoint)
    }

    /// Return the session for an endpoint.
    ///
    /// The endpoint **must** have a session, see [SessionStore::exists].
    pub fn get(&self, endpoint: &PartyEndpoint) -> &SessionId {
        match self.sessions.get(endpoint) {
            Some(session) => session,
            None => panic!("no session for endpoint {}", endpoint),
        }
    }

    pub fn try_get(&self, endpoint: &PartyEndpoint) -> Option<&SessionId> {
        self.sessions.get(endpoint)
    }

    /// Forget the session for an endpoint, returning it if there was one.
    pub fn remove(&mut self, endpoint: &PartyEndpoint) -> Option<SessionId> {
        self.sessions.remove(endpoint)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_store_overwrites() {
        let mut store = SessionStore::new();
        let a = PartyEndpoint::from("a");
        store.store(a.clone(), SessionId::new("s1"));
        store.store(a.clone(), SessionId::new("s2"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&a), &SessionId::new("s2"));
    }

    #[test]
    fn test_remove_and_reset() {
        let mut store = SessionStore::new();
        let a = PartyEndpoint::from("a");
        let b = PartyEndpoint::from("b");
        store.store(a.clone(), SessionId::new("s1"));
        store.store(b.clone(), SessionId::new("s2"));

        assert_eq!(store.remove(&a), Some(SessionId::new("s1")));
        assert!(!store.exists(&a));
        assert!(store.exists(&b));
        assert_eq!(store.remove(&a), None);

        store.reset();
        assert!(store.is_empty());
        assert!(store.try_get(&b).is_none());
    }

    #[test]
    #[should_panic(expected = "no session for endpoint a")]
    fn test_get_without_session_panics() {
        let store = SessionStore::new();
        store.get(&PartyEndpoint::from("a"));
    }
}
