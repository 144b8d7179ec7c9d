use std::collections::HashSet;

use crate::membership::types::NodeId;

/// Per-node lock state: names owned (`held`) and names being acquired (`pending`).
///
/// The two sets are disjoint. A name leaves `pending` before the `try_lock` that put it
/// there returns, either to `held` or back to free.
#[derive(Debug, Default)]
pub struct LockTable {
    held: HashSet<String>,
    pending: HashSet<String>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as pending. Fails if this node already holds or is acquiring it.
    pub fn begin(&mut self, name: &str) -> bool {
        if self.held.contains(name) || self.pending.contains(name) {
            return false;
        }
        self.pending.insert(name.to_string())
    }

    /// Moves `name` from pending to held. Fails if a higher-priority asker took the
    /// pending mark away in the meantime.
    pub fn commit(&mut self, name: &str) -> bool {
        if self.pending.remove(name) {
            self.held.insert(name.to_string());
            true
        } else {
            false
        }
    }

    /// Drops a pending mark after a peer denied the name.
    pub fn abandon(&mut self, name: &str) {
        self.pending.remove(name);
    }

    /// Claims `name` without asking anyone (single mode).
    pub fn hold(&mut self, name: &str) -> bool {
        if self.pending.contains(name) {
            return false;
        }
        self.held.insert(name.to_string())
    }

    pub fn release(&mut self, name: &str) -> bool {
        self.held.remove(name)
    }

    /// Answers a peer's `is_locked` query against local state.
    ///
    /// On a pending/pending tie the lower id wins. When the local node loses it yields
    /// by dropping its pending mark, which makes its own `commit` fail.
    pub fn answer(&mut self, name: &str, local: NodeId, asker: NodeId) -> bool {
        if self.held.contains(name) {
            return true;
        }

        if self.pending.contains(name) {
            if local < asker {
                return true;
            }
            if local > asker {
                self.pending.remove(name);
            }
        }

        false
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held.contains(name)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains(name)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}
