//! In-process farm used by tests: links call the target node's lock directly instead of
//! going through HTTP. Every call yields once to let concurrent callers interleave.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::retry::RetryPolicy;
use super::service::MembershipService;
use super::types::{NodeId, PeerConnector, PeerLink};
use crate::lock::service::DistributedLock;

#[derive(Default)]
pub(crate) struct LocalFarm {
    nodes: DashMap<String, Arc<DistributedLock>>,
    queries: DashMap<String, Arc<AtomicUsize>>,
}

impl LocalFarm {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn connector(self: &Arc<Self>) -> Arc<dyn PeerConnector> {
        Arc::new(LocalConnector { farm: self.clone() })
    }

    /// Creates a node whose seeds are every other address in `members`, and makes it
    /// reachable. Peers are not contacted until the caller subscribes.
    pub(crate) fn add_node(self: &Arc<Self>, id: u32, members: &[&str]) -> Arc<DistributedLock> {
        let address = members[(id - 1) as usize].to_string();
        let membership = MembershipService::new(
            address.clone(),
            members.iter().map(|m| m.to_string()).collect(),
            self.connector(),
            RetryPolicy::with_backoff_unit(Duration::from_millis(1)),
            CancellationToken::new(),
        );
        let lock = Arc::new(DistributedLock::farm(NodeId(id), membership));
        self.nodes.insert(address, lock.clone());
        lock
    }

    /// Simulates a crashed node: calls to it fail from now on.
    pub(crate) fn take_down(&self, address: &str) {
        self.nodes.remove(address);
    }

    /// Number of `is_locked` calls that reached (or tried to reach) `address`.
    pub(crate) fn queries_to(&self, address: &str) -> usize {
        self.queries
            .get(address)
            .map(|count| count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn node(&self, address: &str) -> Result<Arc<DistributedLock>> {
        self.nodes
            .get(address)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("connection refused: {}", address))
    }
}

struct LocalConnector {
    farm: Arc<LocalFarm>,
}

impl PeerConnector for LocalConnector {
    fn connect(&self, address: &str) -> Arc<dyn PeerLink> {
        Arc::new(LocalLink {
            farm: self.farm.clone(),
            address: address.to_string(),
        })
    }
}

struct LocalLink {
    farm: Arc<LocalFarm>,
    address: String,
}

#[async_trait]
impl PeerLink for LocalLink {
    async fn subscribe(&self, address: &str) -> Result<()> {
        tokio::task::yield_now().await;
        let node = self.farm.node(&self.address)?;
        let membership = node
            .membership()
            .ok_or_else(|| anyhow::anyhow!("{} runs in single mode", self.address))?;
        membership.subscribe(address);
        Ok(())
    }

    async fn is_locked(&self, name: &str, asker: NodeId) -> Result<bool> {
        self.farm
            .queries
            .entry(self.address.clone())
            .or_default()
            .fetch_add(1, Ordering::SeqCst);

        tokio::task::yield_now().await;
        let node = self.farm.node(&self.address)?;
        Ok(node.is_locked(name, asker))
    }
}
