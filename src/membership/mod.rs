//! Membership & Discovery Module
//!
//! Keeps, for one farm node, the list of peers that are currently reachable and a
//! handle to talk to each of them.
//!
//! ## Core Mechanisms
//! - **Join**: A node binds its peer endpoint, then asks every configured farm member to
//!   `subscribe` it. Members that never answer are left out; they may subscribe later.
//! - **Subscribe**: Inbound registration. Adds or replaces the caller, so it is idempotent.
//! - **Eviction**: A peer whose RPC fails across the retry bound is removed for good.
//!   It comes back only by subscribing again (there is no periodic re-check).

pub mod client;
pub mod retry;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod local;
