use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use hyper::StatusCode;
use serde_json::{json, Value};

use crate::api::changes::{ChangeType, ResourceChangeEvent, ResourceType};
use crate::api::{actor_from, error_response, AppState};
use crate::provider::{CreateSnapshotRequest, UpdateSnapshotRequest};

fn snapshot_changed(state: &AppState, change_type: ChangeType, snapshot_id: String) {
    let _ = state.changes_tx.send(ResourceChangeEvent {
        resource_type: ResourceType::Snapshot,
        change_type,
        resource_id: snapshot_id,
        timestamp: Utc::now(),
    });
}

/// GET /api/hosts/{id}/snapshots — list snapshots (view_snapshots).
pub(crate) async fn index(
    State(state): State<AppState>,
    Path(host_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let actor = actor_from(&headers);
    let snapshots = state
        .service
        .list(&actor, &host_id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "snapshots": snapshots })))
}

/// GET /api/hosts/{id}/snapshots/{snapshot_id} — show one (view_snapshots).
pub(crate) async fn show(
    State(state): State<AppState>,
    Path((host_id, snapshot_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let actor = actor_from(&headers);
    let snapshot = state
        .service
        .show(&actor, &host_id, &snapshot_id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::to_value(&snapshot).unwrap()))
}

/// POST /api/hosts/{id}/snapshots — take a snapshot (create_snapshots).
pub(crate) async fn create(
    State(state): State<AppState>,
    Path(host_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<CreateSnapshotRequest>>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let actor = actor_from(&headers);
    let req = body.map(|Json(b)| b).unwrap_or_default();

    let snapshot = state
        .service
        .create(&actor, &host_id, &req)
        .await
        .map_err(|e| {
            tracing::warn!(host_id = %host_id, error = %e, "snapshot create failed");
            error_response(e)
        })?;

    snapshot_changed(&state, ChangeType::Created, snapshot.id.clone());
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(&snapshot).unwrap()),
    ))
}

/// PUT /api/hosts/{id}/snapshots/{snapshot_id} — rename (edit_snapshots).
pub(crate) async fn update(
    State(state): State<AppState>,
    Path((host_id, snapshot_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<UpdateSnapshotRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let actor = actor_from(&headers);
    let snapshot = state
        .service
        .update(&actor, &host_id, &snapshot_id, &req)
        .await
        .map_err(|e| {
            tracing::warn!(host_id = %host_id, snapshot_id = %snapshot_id, error = %e, "snapshot update failed");
            error_response(e)
        })?;

    snapshot_changed(&state, ChangeType::Updated, snapshot_id);
    Ok(Json(serde_json::to_value(&snapshot).unwrap()))
}

/// DELETE /api/hosts/{id}/snapshots/{snapshot_id} — destroy (destroy_snapshots).
pub(crate) async fn destroy(
    State(state): State<AppState>,
    Path((host_id, snapshot_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let actor = actor_from(&headers);
    state
        .service
        .destroy(&actor, &host_id, &snapshot_id)
        .await
        .map_err(|e| {
            tracing::warn!(host_id = %host_id, snapshot_id = %snapshot_id, error = %e, "snapshot destroy failed");
            error_response(e)
        })?;

    snapshot_changed(&state, ChangeType::Deleted, snapshot_id);
    Ok(Json(json!({ "deleted": true })))
}

/// POST /api/hosts/{id}/snapshots/{snapshot_id}/revert — roll back (revert_snapshots).
pub(crate) async fn revert(
    State(state): State<AppState>,
    Path((host_id, snapshot_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let actor = actor_from(&headers);
    state
        .service
        .revert(&actor, &host_id, &snapshot_id)
        .await
        .map_err(|e| {
            tracing::warn!(host_id = %host_id, snapshot_id = %snapshot_id, error = %e, "snapshot revert failed");
            error_response(e)
        })?;

    snapshot_changed(&state, ChangeType::Reverted, snapshot_id);
    Ok(Json(json!({ "reverted": true })))
}
