use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::changes::{ChangeType, ResourceChangeEvent, ResourceType};
use crate::api::AppState;
use crate::hosts::Host;
use crate::provider::ProviderKind;

pub(crate) async fn list_hosts(State(state): State<AppState>) -> Json<Value> {
    let hosts = state.host_repo.list().await;

    let summaries: Vec<Value> = hosts
        .iter()
        .map(|h| {
            json!({
                "id": h.id,
                "name": h.name,
                "backend": h.backend,
                "machine_ref": h.machine_ref,
                "created_at": h.created_at,
            })
        })
        .collect();

    Json(json!({ "hosts": summaries }))
}

pub(crate) async fn get_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let host = state.host_repo.get(&id).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "host not found" })),
        )
    })?;

    Ok(Json(serde_json::to_value(&host).unwrap()))
}

#[derive(Deserialize)]
pub(crate) struct CreateHostRequest {
    name: String,
    backend: ProviderKind,
    machine_ref: String,
}

pub(crate) async fn create_host(
    State(state): State<AppState>,
    Json(body): Json<CreateHostRequest>,
) -> (StatusCode, Json<Value>) {
    let host = Host::new(
        Uuid::new_v4().to_string(),
        body.name,
        body.backend,
        body.machine_ref,
    );

    let id = host.id.clone();
    if let Err(e) = state.host_repo.save(host).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("failed to save host: {e}") })),
        );
    }

    let _ = state.changes_tx.send(ResourceChangeEvent {
        resource_type: ResourceType::Host,
        change_type: ChangeType::Created,
        resource_id: id.clone(),
        timestamp: Utc::now(),
    });

    (StatusCode::CREATED, Json(json!({ "id": id })))
}

pub(crate) async fn delete_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let existed = state.host_repo.delete(&id).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("failed to delete host: {e}") })),
        )
    })?;

    if !existed {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "host not found" })),
        ));
    }

    // A deregistered host takes its local snapshot records with it. The
    // provider-side snapshots are untouched; this is inventory cleanup only.
    let dropped = state.registry.remove_host(&id).await;
    if dropped > 0 {
        tracing::info!(host_id = %id, dropped = dropped, "dropped registry entries for deregistered host");
    }

    let _ = state.changes_tx.send(ResourceChangeEvent {
        resource_type: ResourceType::Host,
        change_type: ChangeType::Deleted,
        resource_id: id,
        timestamp: Utc::now(),
    });

    Ok(Json(json!({ "deleted": true })))
}
