pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hosts", get(handlers::list_hosts).post(handlers::create_host))
        .route(
            "/hosts/{id}",
            get(handlers::get_host).delete(handlers::delete_host),
        )
}
