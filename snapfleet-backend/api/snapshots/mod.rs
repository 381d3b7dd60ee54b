pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/hosts/{id}/snapshots",
            get(handlers::index).post(handlers::create),
        )
        .route(
            "/hosts/{id}/snapshots/{snapshot_id}",
            get(handlers::show)
                .put(handlers::update)
                .delete(handlers::destroy),
        )
        .route(
            "/hosts/{id}/snapshots/{snapshot_id}/revert",
            post(handlers::revert),
        )
}
