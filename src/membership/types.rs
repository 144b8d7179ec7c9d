use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Static identity and priority of a farm member.
///
/// It is the 1-based position of the node in the configured member list. When two nodes
/// race for the same name, the lower id wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// The two calls one farm member can make on another.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Registers `address` as a live member on the remote node.
    async fn subscribe(&self, address: &str) -> Result<()>;

    /// Asks the remote node whether it claims `name`, on behalf of `asker`.
    async fn is_locked(&self, name: &str, asker: NodeId) -> Result<bool>;
}

/// Produces a [`PeerLink`] for a `host:port` address.
///
/// Connecting is lazy; the first real round trip is the `subscribe` or `is_locked` call.
pub trait PeerConnector: Send + Sync {
    fn connect(&self, address: &str) -> Arc<dyn PeerLink>;
}

/// A member of the farm as seen from the local node.
#[derive(Clone)]
pub struct Peer {
    pub address: String,
    pub link: Arc<dyn PeerLink>,
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer").field("address", &self.address).finish()
    }
}
