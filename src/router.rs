//! Recipient resolution
//!
//! Works out which sessions a message should reach, applying the block
//! graph. Pure reads over the registry and block graph; the caller does
//! the actual delivery.

use crate::block::BlockGraph;
use crate::error::AppError;
use crate::registry::SessionRegistry;
use crate::types::{Audience, SessionId};

/// Sessions that should receive a message from `sender` to `audience`
///
/// - own name: only the sender's session (echo, never suppressed)
/// - `ALL`: the sender's session plus every unsuppressed peer
/// - other online user: that session, or nobody if suppressed (silently)
///
/// # Errors
/// [`AppError::UnknownAudience`] if a named audience is not online.
pub fn recipients(
    registry: &SessionRegistry,
    blocks: &BlockGraph,
    sender: &str,
    audience: &Audience,
) -> Result<Vec<SessionId>, AppError> {
    match audience {
        Audience::User(name) if name == sender => {
            Ok(registry.lookup(sender).map(|s| s.id).into_iter().collect())
        }
        Audience::All => {
            let mut targets: Vec<SessionId> = registry.lookup(sender).map(|s| s.id).into_iter().collect();
            targets.extend(peers(registry, blocks, sender));
            Ok(targets)
        }
        Audience::User(name) => {
            let session = registry
                .lookup(name)
                .ok_or_else(|| AppError::UnknownAudience(name.clone()))?;
            if blocks.is_suppressed(sender, name) {
                Ok(Vec::new())
            } else {
                Ok(vec![session.id])
            }
        }
    }
}

/// Every online session other than `user`'s that `user` is not suppressed with
///
/// Used for presence notices, where the subject never gets its own copy.
pub fn peers(registry: &SessionRegistry, blocks: &BlockGraph, user: &str) -> Vec<SessionId> {
    registry
        .registered()
        .filter(|(name, _)| *name != user && !blocks.is_suppressed(user, name))
        .map(|(_, id)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::sync::mpsc;

    use super::*;
    use crate::session::Session;

    struct Fixture {
        registry: SessionRegistry,
        blocks: BlockGraph,
    }

    impl Fixture {
        fn online(names: &[&str]) -> Self {
            let mut registry = SessionRegistry::new();
            for name in names {
                let (tx, _rx) = mpsc::channel(8);
                let id = SessionId::new();
                registry.connect(Session::new(id, tx));
                assert!(registry.register(name, id));
            }
            Self {
                registry,
                blocks: BlockGraph::new(),
            }
        }

        fn id(&self, name: &str) -> SessionId {
            self.registry.lookup(name).unwrap().id
        }

        fn route(&self, sender: &str, audience: &str) -> Result<HashSet<SessionId>, AppError> {
            recipients(&self.registry, &self.blocks, sender, &Audience::parse(audience))
                .map(|ids| ids.into_iter().collect())
        }

        fn ids(&self, names: &[&str]) -> HashSet<SessionId> {
            names.iter().map(|n| self.id(n)).collect()
        }
    }

    #[test]
    fn test_broadcast_reaches_everyone() {
        let f = Fixture::online(&["alice", "bob", "carol"]);
        assert_eq!(
            f.route("alice", "ALL").unwrap(),
            f.ids(&["alice", "bob", "carol"])
        );
    }

    #[test]
    fn test_broadcast_exclusion_both_directions() {
        let mut f = Fixture::online(&["alice", "bob", "carol"]);
        f.blocks.block("alice", "bob");

        assert_eq!(f.route("alice", "ALL").unwrap(), f.ids(&["alice", "carol"]));
        assert_eq!(f.route("bob", "ALL").unwrap(), f.ids(&["bob", "carol"]));
    }

    #[test]
    fn test_self_echo_ignores_blocks() {
        let mut f = Fixture::online(&["alice", "bob"]);
        f.blocks.block("alice", "bob");
        assert_eq!(f.route("alice", "alice").unwrap(), f.ids(&["alice"]));
    }

    #[test]
    fn test_direct_message() {
        let f = Fixture::online(&["alice", "bob", "carol"]);
        assert_eq!(f.route("alice", "bob").unwrap(), f.ids(&["bob"]));
    }

    #[test]
    fn test_direct_to_suppressed_is_silent() {
        let mut f = Fixture::online(&["alice", "bob"]);
        f.blocks.block("bob", "alice");

        assert!(f.route("alice", "bob").unwrap().is_empty());
        assert!(f.route("bob", "alice").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_audience() {
        let f = Fixture::online(&["alice"]);
        let err = f.route("alice", "ghost").unwrap_err();
        assert!(matches!(err, AppError::UnknownAudience(name) if name == "ghost"));
    }

    #[test]
    fn test_peers_exclude_subject() {
        let mut f = Fixture::online(&["alice", "bob", "carol"]);
        f.blocks.block("carol", "alice");

        let peers: HashSet<_> = peers(&f.registry, &f.blocks, "alice").into_iter().collect();
        assert_eq!(peers, f.ids(&["bob"]));
    }
}
