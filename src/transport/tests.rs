//! Transport Module Tests
//!
//! Runs [`HttpTransport`] against a small axum stand-in for the message service.

#[cfg(test)]
mod tests {
    use crate::transport::http::{HEADER_FILE_NAME, HEADER_MESSAGE_TYPE, HttpTransport};
    use crate::transport::{Payload, TransportClient, TransportError};
    use axum::extract::{Path, RawQuery};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::time::Duration;

    async fn handle_send(headers: HeaderMap, body: axum::body::Bytes) -> (StatusCode, HeaderMap, Vec<u8>) {
        let name = headers
            .get(HEADER_FILE_NAME)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut reply = HeaderMap::new();
        reply.insert(HEADER_MESSAGE_TYPE, "ORDERS".parse().unwrap());

        match name.as_str() {
            "broken.xml" => (StatusCode::INTERNAL_SERVER_ERROR, reply, Vec::new()),
            _ if body.is_empty() => (
                StatusCode::UNPROCESSABLE_ENTITY,
                reply,
                b"<rejection reason=\"empty\"/>".to_vec(),
            ),
            _ => (StatusCode::OK, reply, format!("<ack file=\"{}\"/>", name).into_bytes()),
        }
    }

    async fn handle_list(RawQuery(query): RawQuery) -> Json<serde_json::Value> {
        let query = query.unwrap_or_default();
        let mut entries = vec![];
        if query.contains("since=0") {
            entries.push(serde_json::json!({"code": 1, "id": "A", "type": "ORDERS", "version": "2"}));
        }
        if query.contains("type=ORDERS") || !query.contains("type=") {
            entries.push(serde_json::json!({"code": 2, "id": "B", "type": "ORDERS"}));
        }
        Json(serde_json::Value::Array(entries))
    }

    async fn handle_get(Path(code): Path<i64>) -> (StatusCode, Json<serde_json::Value>) {
        match code {
            1 => (
                StatusCode::OK,
                Json(serde_json::json!({"kind": "binary", "name": "scan", "data": "iVBORw0KGgo="})),
            ),
            2 => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "kind": "document", "identification": "B", "version": "2", "content": "<b/>"
                })),
            ),
            _ => (StatusCode::NOT_FOUND, Json(serde_json::Value::Null)),
        }
    }

    async fn spawn_service() -> HttpTransport {
        let app = Router::new()
            .route("/api/messages", post(handle_send).get(handle_list))
            .route("/api/messages/{code}", get(handle_get));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        HttpTransport::new(&format!("http://{}/api/", addr), Duration::from_secs(5))
    }

    // ============================================================
    // SEND
    // ============================================================

    #[tokio::test]
    async fn test_send_accepted() {
        let transport = spawn_service().await;

        let receipt = transport.send("a.xml", b"<a/>".to_vec()).await.unwrap();

        assert!(receipt.accepted);
        assert_eq!(receipt.document, b"<ack file=\"a.xml\"/>".to_vec());
        assert_eq!(receipt.message_type.as_deref(), Some("ORDERS"));
    }

    #[tokio::test]
    async fn test_send_rejection_is_not_an_error() {
        let transport = spawn_service().await;

        let receipt = transport.send("empty.xml", Vec::new()).await.unwrap();

        assert!(!receipt.accepted);
        assert!(String::from_utf8_lossy(&receipt.document).contains("rejection"));
    }

    #[tokio::test]
    async fn test_send_server_error_is_unavailable() {
        let transport = spawn_service().await;

        let result = transport.send("broken.xml", b"x".to_vec()).await;

        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_send_to_dead_service_is_unavailable() {
        let transport = HttpTransport::new("http://127.0.0.1:1", Duration::from_millis(500));

        let result = transport.send("a.xml", b"x".to_vec()).await;

        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }

    // ============================================================
    // LIST / GET
    // ============================================================

    #[tokio::test]
    async fn test_list_passes_since_and_types() {
        let transport = spawn_service().await;

        let all = transport.list(0, &[]).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].version.as_deref(), Some("2"));
        assert!(all[1].version.is_none());

        let newer = transport.list(1, &["ORDERS".to_string()]).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].code, 2);
    }

    #[tokio::test]
    async fn test_get_binary_and_document() {
        let transport = spawn_service().await;

        match transport.get(1).await.unwrap() {
            Payload::Binary { name, data } => {
                assert_eq!(name, "scan");
                assert!(data.starts_with(b"\x89PNG"));
            }
            other => panic!("Wrong payload: {:?}", other),
        }

        match transport.get(2).await.unwrap() {
            Payload::Document {
                identification,
                version,
                content,
            } => {
                assert_eq!(identification, "B");
                assert_eq!(version.as_deref(), Some("2"));
                assert_eq!(content, "<b/>");
            }
            other => panic!("Wrong payload: {:?}", other),
        }

        assert!(transport.get(99).await.is_err());
    }
}
