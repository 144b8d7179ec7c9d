//! HTTP implementation of the peer link, built on a shared `reqwest::Client`.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::types::{NodeId, PeerConnector, PeerLink};
use crate::lock::protocol::{
    ENDPOINT_IS_LOCKED, ENDPOINT_SUBSCRIBE, IsLockedRequest, IsLockedResponse, SubscribeRequest,
    SubscribeResponse,
};

pub struct HttpConnector {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl PeerConnector for HttpConnector {
    fn connect(&self, address: &str) -> Arc<dyn PeerLink> {
        Arc::new(HttpPeerLink {
            base_url: format!("http://{}", address),
            http_client: self.http_client.clone(),
            timeout: self.timeout,
        })
    }
}

pub struct HttpPeerLink {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

#[async_trait]
impl PeerLink for HttpPeerLink {
    async fn subscribe(&self, address: &str) -> Result<()> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, ENDPOINT_SUBSCRIBE))
            .json(&SubscribeRequest {
                address: address.to_string(),
            })
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Subscribe failed: {}", response.status()));
        }

        let body: SubscribeResponse = response.json().await?;
        if !body.accepted {
            return Err(anyhow::anyhow!("Subscribe refused by {}", self.base_url));
        }

        Ok(())
    }

    async fn is_locked(&self, name: &str, asker: NodeId) -> Result<bool> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, ENDPOINT_IS_LOCKED))
            .json(&IsLockedRequest {
                name: name.to_string(),
                asker,
            })
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Lock query failed: {}", response.status()));
        }

        let body: IsLockedResponse = response.json().await?;
        Ok(body.locked)
    }
}
