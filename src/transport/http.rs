use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use std::time::Duration;

use super::{MessageSummary, Payload, SendReceipt, TransportClient, TransportError};

pub const ENDPOINT_MESSAGES: &str = "/messages";
pub const HEADER_FILE_NAME: &str = "X-File-Name";
pub const HEADER_MESSAGE_TYPE: &str = "X-Message-Type";

/// Wire form of `GET /messages/{code}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WirePayload {
    Binary {
        name: String,
        data: String,
    },
    Document {
        identification: String,
        #[serde(default)]
        version: Option<String>,
        content: String,
    },
}

pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn unavailable(e: reqwest::Error) -> TransportError {
    TransportError::Unavailable(e.to_string())
}

#[async_trait]
impl TransportClient for HttpTransport {
    async fn send(&self, file_name: &str, data: Vec<u8>) -> Result<SendReceipt, TransportError> {
        let response = self
            .http_client
            .post(self.url(ENDPOINT_MESSAGES))
            .header(HEADER_FILE_NAME, file_name)
            .body(data)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        let message_type = response
            .headers()
            .get(HEADER_MESSAGE_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() && !status.is_client_error() {
            return Err(TransportError::Unavailable(format!(
                "send {} failed: {}",
                file_name, status
            )));
        }

        let document = response.bytes().await.map_err(unavailable)?.to_vec();

        Ok(SendReceipt {
            accepted: status.is_success(),
            document,
            message_type,
        })
    }

    async fn list(
        &self,
        since_code: i64,
        message_types: &[String],
    ) -> Result<Vec<MessageSummary>, TransportError> {
        let mut query = vec![("since", since_code.to_string())];
        query.extend(message_types.iter().map(|t| ("type", t.clone())));

        let response = self
            .http_client
            .get(self.url(ENDPOINT_MESSAGES))
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(TransportError::Unavailable(format!(
                "list failed: {}",
                response.status()
            )));
        }

        response
            .json::<Vec<MessageSummary>>()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }

    async fn get(&self, code: i64) -> Result<Payload, TransportError> {
        let response = self
            .http_client
            .get(self.url(&format!("{}/{}", ENDPOINT_MESSAGES, code)))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(TransportError::Unavailable(format!(
                "get {} failed: {}",
                code,
                response.status()
            )));
        }

        let wire: WirePayload = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        decode_payload(wire)
    }
}

fn decode_payload(wire: WirePayload) -> Result<Payload, TransportError> {
    match wire {
        WirePayload::Binary { name, data } => {
            let data = BASE64
                .decode(data.as_bytes())
                .map_err(|e| TransportError::Protocol(format!("bad base64 in {}: {}", name, e)))?;
            Ok(Payload::Binary { name, data })
        }
        WirePayload::Document {
            identification,
            version,
            content,
        } => Ok(Payload::Document {
            identification,
            version,
            content,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_binary_payload() {
        let wire: WirePayload =
            serde_json::from_str(r#"{"kind":"binary","name":"scan","data":"JVBERi0="}"#).unwrap();

        let payload = decode_payload(wire).unwrap();
        assert_eq!(
            payload,
            Payload::Binary {
                name: "scan".to_string(),
                data: b"%PDF-".to_vec(),
            }
        );
    }

    #[test]
    fn test_decode_document_without_version() {
        let wire: WirePayload = serde_json::from_str(
            r#"{"kind":"document","identification":"INV-1","content":"<a/>"}"#,
        )
        .unwrap();

        match decode_payload(wire).unwrap() {
            Payload::Document { version, .. } => assert!(version.is_none()),
            other => panic!("Wrong payload: {:?}", other),
        }
    }

    #[test]
    fn test_bad_base64_is_protocol_error() {
        let wire: WirePayload =
            serde_json::from_str(r#"{"kind":"binary","name":"x","data":"@@@"}"#).unwrap();

        assert!(matches!(
            decode_payload(wire),
            Err(TransportError::Protocol(_))
        ));
    }
}
