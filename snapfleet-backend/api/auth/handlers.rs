use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::AppState;

/// GET /api/roles — the loaded role → permission table.
///
/// Read-only introspection for the host application's UI; assignments are
/// deliberately not exposed here.
pub(crate) async fn list_roles(State(state): State<AppState>) -> Json<Value> {
    let roles: Vec<Value> = state
        .gate
        .config()
        .roles()
        .iter()
        .map(|r| {
            json!({
                "name": r.name,
                "permissions": r.permissions,
            })
        })
        .collect();

    Json(json!({ "roles": roles }))
}
