//! Peer RPC Protocol
//!
//! Endpoints and DTOs exchanged between farm members. Bodies are JSON over HTTP.

use crate::membership::types::NodeId;
use serde::{Deserialize, Serialize};

/// Inbound registration of a farm member.
pub const ENDPOINT_SUBSCRIBE: &str = "/farm/subscribe";
/// Lock query answered against the receiver's local lock table.
pub const ENDPOINT_IS_LOCKED: &str = "/farm/is_locked";

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// `host:port` of the subscribing node, as listed in the farm configuration.
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub accepted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IsLockedRequest {
    pub name: String,
    /// Id of the node running `try_lock`; decides pending/pending ties.
    pub asker: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IsLockedResponse {
    pub locked: bool,
}
