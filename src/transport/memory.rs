//! In-memory message service used by task tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use super::{MessageSummary, Payload, SendReceipt, TransportClient, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendMode {
    Accept,
    Reject,
    Fail,
}

pub(crate) struct MemoryTransport {
    mode: Mutex<SendMode>,
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    messages: Mutex<Vec<(MessageSummary, Payload)>>,
    broken: Mutex<HashSet<i64>>,
    list_calls: Mutex<Vec<i64>>,
}

impl MemoryTransport {
    pub(crate) fn new(mode: SendMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            sent: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            broken: Mutex::new(HashSet::new()),
            list_calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn publish(&self, summary: MessageSummary, payload: Payload) {
        self.messages.lock().unwrap().push((summary, payload));
    }

    /// Makes `get(code)` fail.
    pub(crate) fn break_message(&self, code: i64) {
        self.broken.lock().unwrap().insert(code);
    }

    pub(crate) fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    /// `since_code` of every `list` call, in order.
    pub(crate) fn list_calls(&self) -> Vec<i64> {
        self.list_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportClient for MemoryTransport {
    async fn send(&self, file_name: &str, data: Vec<u8>) -> Result<SendReceipt, TransportError> {
        let mode = *self.mode.lock().unwrap();
        if mode == SendMode::Fail {
            return Err(TransportError::Unavailable("connection refused".to_string()));
        }

        self.sent
            .lock()
            .unwrap()
            .push((file_name.to_string(), data));

        let accepted = mode == SendMode::Accept;
        let document = if accepted {
            format!("<ack file=\"{}\"/>", file_name)
        } else {
            format!("<rejection file=\"{}\"/>", file_name)
        };

        Ok(SendReceipt {
            accepted,
            document: document.into_bytes(),
            message_type: Some("INVOIC".to_string()),
        })
    }

    async fn list(
        &self,
        since_code: i64,
        message_types: &[String],
    ) -> Result<Vec<MessageSummary>, TransportError> {
        self.list_calls.lock().unwrap().push(since_code);

        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|(summary, _)| summary.clone())
            .filter(|s| s.code > since_code)
            .filter(|s| message_types.is_empty() || message_types.contains(&s.message_type))
            .collect())
    }

    async fn get(&self, code: i64) -> Result<Payload, TransportError> {
        if self.broken.lock().unwrap().contains(&code) {
            return Err(TransportError::Unavailable(format!("message {} unreadable", code)));
        }

        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|(summary, _)| summary.code == code)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| TransportError::Protocol(format!("no message {}", code)))
    }
}
