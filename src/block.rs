//! Block graph
//!
//! Directed "A has blocked B" relation. Storage is asymmetric, but
//! delivery treats any block between two users as mutual invisibility.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockGraph {
    /// blocker -> users it has blocked
    blocked: HashMap<String, BTreeSet<String>>,
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user` blocks `target`
    ///
    /// Returns true if the relation is new. Self-blocks are ignored.
    pub fn block(&mut self, user: &str, target: &str) -> bool {
        if user == target {
            return false;
        }
        self.blocked
            .entry(user.to_string())
            .or_default()
            .insert(target.to_string())
    }

    /// Remove `target` from `user`'s block set
    ///
    /// Returns true if it was present.
    pub fn unblock(&mut self, user: &str, target: &str) -> bool {
        let Some(set) = self.blocked.get_mut(user) else {
            return false;
        };
        let removed = set.remove(target);
        if set.is_empty() {
            self.blocked.remove(user);
        }
        removed
    }

    /// Has `user` blocked `target` (one direction only)
    pub fn has_blocked(&self, user: &str, target: &str) -> bool {
        self.blocked
            .get(user)
            .is_some_and(|set| set.contains(target))
    }

    /// Should traffic between `a` and `b` be suppressed (either direction)
    pub fn is_suppressed(&self, a: &str, b: &str) -> bool {
        self.has_blocked(a, b) || self.has_blocked(b, a)
    }

    /// Users blocked by `user`, sorted
    pub fn blocked_by(&self, user: &str) -> BTreeSet<String> {
        self.blocked.get(user).cloned().unwrap_or_default()
    }
}
