//! Message Transport Module
//!
//! Client side of the remote message service. The task engine only sees the
//! [`TransportClient`] trait; [`http::HttpTransport`] talks to the service over REST.
//!
//! A rejection by the service is a normal outcome (it carries a document that is saved
//! as an ack). Only network and protocol failures are errors.

pub mod http;

#[cfg(test)]
pub(crate) mod memory;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Network failure, timeout or server-side error.
    #[error("message service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with something we could not understand.
    #[error("message service protocol error: {0}")]
    Protocol(String),
}

/// Result of submitting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// `false` for a well-formed rejection.
    pub accepted: bool,
    /// Acknowledgement or rejection document returned by the service.
    pub document: Vec<u8>,
    pub message_type: Option<String>,
}

/// One entry of a message listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub code: i64,
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Full content of a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Opaque bytes with the name the service supplied.
    Binary { name: String, data: Vec<u8> },
    /// Text message addressed by identification and optional version.
    Document {
        identification: String,
        version: Option<String>,
        content: String,
    },
}

impl Payload {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Payload::Binary { data, .. } => data,
            Payload::Document { content, .. } => content.as_bytes(),
        }
    }
}

#[async_trait]
pub trait TransportClient: Send + Sync {
    async fn send(&self, file_name: &str, data: Vec<u8>) -> Result<SendReceipt, TransportError>;

    /// Messages with a code greater than `since_code`, restricted to `message_types`
    /// when the list is not empty.
    async fn list(
        &self,
        since_code: i64,
        message_types: &[String],
    ) -> Result<Vec<MessageSummary>, TransportError>;

    async fn get(&self, code: i64) -> Result<Payload, TransportError>;
}
