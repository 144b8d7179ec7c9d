use super::protocol::*;
use super::service::DistributedLock;

use axum::{Extension, Json, Router, http::StatusCode, routing::post};
use std::sync::Arc;

/// Routes for the peer RPC surface of one node.
pub fn router(lock: Arc<DistributedLock>) -> Router {
    Router::new()
        .route(ENDPOINT_SUBSCRIBE, post(handle_subscribe))
        .route(ENDPOINT_IS_LOCKED, post(handle_is_locked))
        .layer(Extension(lock))
}

pub async fn handle_subscribe(
    Extension(lock): Extension<Arc<DistributedLock>>,
    Json(req): Json<SubscribeRequest>,
) -> (StatusCode, Json<SubscribeResponse>) {
    match lock.membership() {
        Some(membership) => {
            membership.subscribe(&req.address);
            (StatusCode::OK, Json(SubscribeResponse { accepted: true }))
        }
        None => {
            tracing::warn!("Refusing subscribe from {}: single mode", req.address);
            (
                StatusCode::CONFLICT,
                Json(SubscribeResponse { accepted: false }),
            )
        }
    }
}

pub async fn handle_is_locked(
    Extension(lock): Extension<Arc<DistributedLock>>,
    Json(req): Json<IsLockedRequest>,
) -> (StatusCode, Json<IsLockedResponse>) {
    let locked = lock.is_locked(&req.name, req.asker);

    tracing::trace!(
        "Lock query for {} from {} -> {}",
        req.name,
        req.asker,
        locked
    );

    (StatusCode::OK, Json(IsLockedResponse { locked }))
}
