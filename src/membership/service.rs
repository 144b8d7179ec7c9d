use anyhow::{Context, Result};
use axum::Router;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::retry::RetryPolicy;
use super::types::{NodeId, Peer, PeerConnector};

pub struct MembershipService {
    /// `host:port` this node is reachable at; sent to peers on subscribe.
    pub self_address: String,
    /// Live peers, keyed by address.
    pub peers: Arc<DashMap<String, Peer>>,
    /// Configured farm members other than this node.
    seed_addresses: Vec<String>,
    connector: Arc<dyn PeerConnector>,
    retry: RetryPolicy,
    /// Cuts retry backoffs short once the node is stopping.
    shutdown: CancellationToken,
    listening: AtomicBool,
}

impl MembershipService {
    pub fn new(
        self_address: impl Into<String>,
        seed_addresses: Vec<String>,
        connector: Arc<dyn PeerConnector>,
        retry: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let self_address = self_address.into();
        let seed_addresses = seed_addresses
            .into_iter()
            .filter(|addr| addr != &self_address)
            .collect();

        Arc::new(Self {
            self_address,
            peers: Arc::new(DashMap::new()),
            seed_addresses,
            connector,
            retry,
            shutdown,
            listening: AtomicBool::new(false),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Binds the peer endpoint at `self_address` (unless one is already served by this
    /// registry) and subscribes to every configured farm member.
    ///
    /// Returns the number of members that accepted the subscription.
    pub async fn join(&self, router: Router, shutdown: CancellationToken) -> Result<usize> {
        if !self.listening.load(Ordering::SeqCst) {
            let listener = TcpListener::bind(&self.self_address)
                .await
                .with_context(|| format!("Failed to bind peer endpoint {}", self.self_address))?;
            self.serve(listener, router, shutdown)?;
        }

        Ok(self.subscribe_to_seeds().await)
    }

    /// Serves `router` on an already bound listener until `shutdown` fires.
    pub fn serve(
        &self,
        listener: TcpListener,
        router: Router,
        shutdown: CancellationToken,
    ) -> Result<SocketAddr> {
        let local_addr = listener.local_addr()?;

        if self.listening.swap(true, Ordering::SeqCst) {
            anyhow::bail!("Peer endpoint for {} is already bound", self.self_address);
        }

        info!("Peer endpoint listening on {}", local_addr);

        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;

            if let Err(e) = result {
                tracing::error!("Peer endpoint on {} stopped: {}", local_addr, e);
            }
        });

        Ok(local_addr)
    }

    /// Asks every configured farm member to subscribe this node. Returns how many accepted.
    pub async fn subscribe_to_seeds(&self) -> usize {
        if self.seed_addresses.is_empty() {
            info!("No other farm members configured");
            return 0;
        }

        info!("Joining farm via {} member(s)", self.seed_addresses.len());

        let mut joined = 0;
        for address in &self.seed_addresses {
            let link = self.connector.connect(address);
            let result = self
                .retry
                .run(&self.shutdown, || {
                    let link = link.clone();
                    async move { link.subscribe(&self.self_address).await }
                })
                .await;

            match result {
                Ok(()) => {
                    self.peers.insert(
                        address.clone(),
                        Peer {
                            address: address.clone(),
                            link,
                        },
                    );
                    info!("Subscribed to farm member {}", address);
                    joined += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Farm member {} did not answer, leaving it out: {}",
                        address,
                        e
                    );
                }
            }
        }

        info!("Farm size now: {} peer(s)", self.peers.len());
        joined
    }

    /// Inbound registration from another farm member. Adds or replaces the entry.
    pub fn subscribe(&self, address: &str) {
        if address == self.self_address {
            tracing::debug!("Ignoring subscribe from own address {}", address);
            return;
        }

        let peer = Peer {
            address: address.to_string(),
            link: self.connector.connect(address),
        };

        if self.peers.insert(address.to_string(), peer).is_some() {
            info!("Farm member {} re-subscribed", address);
        } else {
            info!("Farm member {} subscribed", address);
        }
    }

    /// Removes `peer` if the registry still holds that same handle.
    ///
    /// Returns `false` when it was already gone or replaced by a fresh subscription.
    pub fn evict(&self, peer: &Peer, reason: &anyhow::Error) -> bool {
        let removed = self
            .peers
            .remove_if(&peer.address, |_, current| {
                Arc::ptr_eq(&current.link, &peer.link)
            })
            .is_some();

        if removed {
            tracing::warn!("Farm member {} declared dead: {}", peer.address, reason);
        }

        removed
    }

    /// Snapshot of the current peers. No registry lock is held once this returns.
    pub fn peers(&self) -> Vec<Peer> {
        self.peers.iter().map(|entry| entry.value().clone()).collect()
    }

    /// True once the shutdown token given at construction has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Asks `peer` whether it claims `name`, retrying within the policy bound.
    pub async fn query_is_locked(&self, peer: &Peer, name: &str, asker: NodeId) -> Result<bool> {
        self.retry
            .run(&self.shutdown, || async move { peer.link.is_locked(name, asker).await })
            .await
    }
}
