pub mod auth;
pub mod changes;
pub mod hosts;
pub mod middleware;
mod routes;
pub mod snapshots;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::{Json, Router};
use hyper::StatusCode;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::api::changes::ResourceChangeEvent;
use crate::auth::gate::PermissionGate;
use crate::hosts::repository::HostRepository;
use crate::snapshots::error::SnapshotError;
use crate::snapshots::registry::SnapshotRegistry;
use crate::snapshots::service::SnapshotService;

#[derive(Clone)]
pub struct AppState {
    pub host_repo: Arc<dyn HostRepository>,
    pub registry: Arc<SnapshotRegistry>,
    pub service: Arc<SnapshotService>,
    pub gate: Arc<PermissionGate>,
    pub changes_tx: broadcast::Sender<ResourceChangeEvent>,
}

/// Actor identity as supplied by the fleet identity system in front of us.
/// No header means an anonymous actor, which holds no roles and is denied
/// every gated action.
pub(crate) fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get("x-actor")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Map a domain error onto an HTTP response. Retryable kinds surface as 503
/// so callers and proxies know a retry is reasonable.
pub(crate) fn error_response(err: SnapshotError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        SnapshotError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        SnapshotError::HostNotFound(_) | SnapshotError::NotFound(_) => StatusCode::NOT_FOUND,
        SnapshotError::Conflict(_) => StatusCode::CONFLICT,
        SnapshotError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        SnapshotError::Timeout | SnapshotError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SnapshotError::Io(_) | SnapshotError::Serde(_) | SnapshotError::Backend(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(json!({ "error": err.to_string(), "retryable": err.is_retryable() })),
    )
}

pub fn create_app(state: AppState) -> Router {
    routes::build_router(state)
}
