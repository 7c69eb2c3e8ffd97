//! Session registry
//!
//! Single source of truth for who is connected and who is online. Holds
//! every live [`Session`] (anonymous ones included), the username index
//! over registered sessions, and the set of every name that has ever
//! registered.

use std::collections::{BTreeSet, HashMap};

use crate::message::UserStatus;
use crate::session::Session;
use crate::types::SessionId;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// All live connections: SessionId -> Session
    sessions: HashMap<SessionId, Session>,
    /// Online users: username -> SessionId
    by_name: HashMap<String, SessionId>,
    /// Every username ever registered, online or not
    all_users: BTreeSet<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with previously persisted users
    pub fn with_known_users(all_users: BTreeSet<String>) -> Self {
        Self {
            all_users,
            ..Self::default()
        }
    }

    /// Track a freshly accepted connection (anonymous)
    pub fn connect(&mut self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    /// Forget a closed connection
    ///
    /// Unregisters it first if it held a name. Returns the removed session.
    pub fn disconnect(&mut self, id: SessionId) -> Option<Session> {
        self.unregister(id);
        self.sessions.remove(&id)
    }

    /// Claim `name` for the session `id`
    ///
    /// Accepted iff the name is non-empty, not currently online, and the
    /// session exists and is still anonymous. A rejected session stays
    /// anonymous and no mapping is touched.
    pub fn register(&mut self, name: &str, id: SessionId) -> bool {
        if name.is_empty() || self.by_name.contains_key(name) {
            return false;
        }
        let Some(session) = self.sessions.get_mut(&id) else {
            return false;
        };
        if !session.set_username(name.to_string()) {
            return false;
        }

        self.by_name.insert(name.to_string(), id);
        self.all_users.insert(name.to_string());
        true
    }

    /// Drop the username mapping held by session `id`
    ///
    /// Idempotent. Returns the name that went offline, if any.
    pub fn unregister(&mut self, id: SessionId) -> Option<String> {
        let name = self.sessions.get(&id)?.username()?.to_string();
        match self.by_name.get(&name) {
            Some(owner) if *owner == id => {
                self.by_name.remove(&name);
                Some(name)
            }
            _ => None,
        }
    }

    /// Online session registered under `name`
    pub fn lookup(&self, name: &str) -> Option<&Session> {
        self.by_name.get(name).and_then(|id| self.sessions.get(id))
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Is `name` currently online
    pub fn is_online(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Has `name` ever registered
    pub fn is_known(&self, name: &str) -> bool {
        self.all_users.contains(name)
    }

    /// Registered sessions as (name, session id) pairs
    pub fn registered(&self) -> impl Iterator<Item = (&str, SessionId)> + '_ {
        self.by_name.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Online usernames, sorted
    pub fn online(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every user ever seen with their online flag, sorted by name
    pub fn list(&self) -> Vec<UserStatus> {
        self.all_users
            .iter()
            .map(|name| UserStatus {
                name: name.clone(),
                active: self.is_online(name),
            })
            .collect()
    }

    pub fn all_users(&self) -> &BTreeSet<String> {
        &self.all_users
    }

    /// Number of live connections (anonymous included)
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of online users
    pub fn online_count(&self) -> usize {
        self.by_name.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use tokio::sync::mpsc;

    fn connect(registry: &mut SessionRegistry) -> SessionId {
        let (tx, _rx) = mpsc::channel(8);
        let id = SessionId::new();
        registry.connect(Session::new(id, tx));
        id
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = SessionRegistry::new();
        let id = connect(&mut registry);

        assert!(registry.register("alice", id));
        assert_eq!(registry.lookup("alice").map(|s| s.id), Some(id));
        assert!(registry.is_online("alice"));
        assert!(registry.is_known("alice"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = SessionRegistry::new();
        let s1 = connect(&mut registry);
        let s2 = connect(&mut registry);

        assert!(registry.register("alice", s1));
        assert!(!registry.register("alice", s2));

        // Original mapping untouched, second session still anonymous
        assert_eq!(registry.lookup("alice").map(|s| s.id), Some(s1));
        assert_eq!(
            registry.get(s2).map(|s| s.state()),
            Some(SessionState::Anonymous)
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = SessionRegistry::new();
        let id = connect(&mut registry);
        assert!(!registry.register("", id));
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn test_second_registration_rejected() {
        let mut registry = SessionRegistry::new();
        let id = connect(&mut registry);

        assert!(registry.register("alice", id));
        assert!(!registry.register("alice2", id));
        assert!(!registry.is_online("alice2"));
    }

    #[test]
    fn test_unregister_idempotent() {
        let mut registry = SessionRegistry::new();
        let id = connect(&mut registry);
        registry.register("alice", id);

        assert_eq!(registry.unregister(id), Some("alice".to_string()));
        assert_eq!(registry.unregister(id), None);
        assert!(registry.lookup("alice").is_none());
        // Still remembered for status queries
        assert!(registry.is_known("alice"));
    }

    #[test]
    fn test_disconnect_frees_name() {
        let mut registry = SessionRegistry::new();
        let s1 = connect(&mut registry);
        registry.register("alice", s1);

        let removed = registry.disconnect(s1).unwrap();
        assert_eq!(removed.username(), Some("alice"));
        assert_eq!(registry.connection_count(), 0);

        let s2 = connect(&mut registry);
        assert!(registry.register("alice", s2));
    }

    #[test]
    fn test_list_marks_online() {
        let known = ["carol".to_string()].into_iter().collect();
        let mut registry = SessionRegistry::with_known_users(known);
        let id = connect(&mut registry);
        registry.register("bob", id);

        assert_eq!(
            registry.list(),
            vec![
                UserStatus {
                    name: "bob".into(),
                    active: true
                },
                UserStatus {
                    name: "carol".into(),
                    active: false
                },
            ]
        );
        assert_eq!(registry.online(), vec!["bob".to_string()]);
    }
}
