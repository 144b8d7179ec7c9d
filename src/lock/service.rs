use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::handlers;
use super::table::LockTable;
use crate::membership::service::MembershipService;
use crate::membership::types::NodeId;

enum LockMode {
    /// No farm configured: every name is granted locally.
    Single,
    Farm {
        node_id: NodeId,
        membership: Arc<MembershipService>,
    },
}

/// Farm-wide mutual exclusion over names.
///
/// The table mutex is only held while the table is mutated, never across a peer round
/// trip, so unrelated names locked by different pipelines don't serialize on each other.
pub struct DistributedLock {
    mode: LockMode,
    table: Mutex<LockTable>,
}

impl DistributedLock {
    pub fn single() -> Self {
        Self {
            mode: LockMode::Single,
            table: Mutex::new(LockTable::new()),
        }
    }

    pub fn farm(node_id: NodeId, membership: Arc<MembershipService>) -> Self {
        Self {
            mode: LockMode::Farm {
                node_id,
                membership,
            },
            table: Mutex::new(LockTable::new()),
        }
    }

    pub fn node_id(&self) -> Option<NodeId> {
        match &self.mode {
            LockMode::Single => None,
            LockMode::Farm { node_id, .. } => Some(*node_id),
        }
    }

    pub fn membership(&self) -> Option<&Arc<MembershipService>> {
        match &self.mode {
            LockMode::Single => None,
            LockMode::Farm { membership, .. } => Some(membership),
        }
    }

    /// Serves the peer endpoint and subscribes to the other farm members.
    /// A no-op in single mode.
    pub async fn join(self: &Arc<Self>, shutdown: CancellationToken) -> Result<usize> {
        match &self.mode {
            LockMode::Single => {
                tracing::info!("Running in single mode, farm locking disabled");
                Ok(0)
            }
            LockMode::Farm {
                node_id,
                membership,
            } => {
                tracing::info!("Joining farm as {} at {}", node_id, membership.self_address);
                membership
                    .join(handlers::router(self.clone()), shutdown)
                    .await
            }
        }
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        // A panic while holding the guard can't leave the sets half-updated
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tries to become the single owner of `name` across the farm.
    pub async fn try_lock(&self, name: &str) -> bool {
        let (node_id, membership) = match &self.mode {
            LockMode::Single => return self.table().hold(name),
            LockMode::Farm {
                node_id,
                membership,
            } => (*node_id, membership),
        };

        if !self.table().begin(name) {
            tracing::trace!("{} already claimed locally", name);
            return false;
        }

        for peer in membership.peers() {
            match membership.query_is_locked(&peer, name, node_id).await {
                Ok(true) => {
                    tracing::debug!("{} is claimed by {}", name, peer.address);
                    self.table().abandon(name);
                    return false;
                }
                Ok(false) => continue,
                Err(_) if membership.is_shutting_down() => {
                    tracing::debug!("{} not claimed, node is shutting down", name);
                    self.table().abandon(name);
                    return false;
                }
                Err(e) => {
                    membership.evict(&peer, &e);
                }
            }
        }

        let acquired = self.table().commit(name);
        if acquired {
            tracing::debug!("Acquired {}", name);
        } else {
            tracing::debug!("Yielded {} to a higher-priority node", name);
        }
        acquired
    }

    /// Like [`try_lock`](Self::try_lock), but releases the name when the guard drops.
    pub async fn acquire(&self, name: &str) -> Option<HeldName<'_>> {
        if self.try_lock(name).await {
            Some(HeldName {
                lock: self,
                name: name.to_string(),
            })
        } else {
            None
        }
    }

    /// Drops ownership of `name`. Releasing a name that isn't held is a no-op.
    pub fn release(&self, name: &str) {
        if self.table().release(name) {
            tracing::trace!("Released {}", name);
        }
    }

    /// Answers a peer's query. Single-mode nodes only report what they hold.
    pub fn is_locked(&self, name: &str, asker: NodeId) -> bool {
        match &self.mode {
            LockMode::Single => self.table().is_held(name),
            LockMode::Farm { node_id, .. } => self.table().answer(name, *node_id, asker),
        }
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.table().is_held(name)
    }
}

/// Ownership of one name; released on drop.
pub struct HeldName<'a> {
    lock: &'a DistributedLock,
    name: String,
}

impl HeldName<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for HeldName<'_> {
    fn drop(&mut self) {
        self.lock.release(&self.name);
    }
}
