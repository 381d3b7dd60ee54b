use axum::{
    body::Body,
    http::{Request, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::Span;

/// Record request fields on the current span so provider failures can be
/// traced back to the call that triggered them.
pub async fn enrich_request_span(req: Request<Body>, next: Next) -> Response {
    let uri: &Uri = req.uri();
    let span = Span::current();

    span.record("http.uri", uri.path());
    if let Some(query) = uri.query() {
        span.record("http.query", query);
    }
    if let Some(actor) = req.headers().get("x-actor").and_then(|v| v.to_str().ok()) {
        span.record("actor", actor);
    }

    next.run(req).await
}

pub async fn strip_trailing_slash(req: Request<Body>, next: Next) -> Response {
    let uri = req.uri();

    if let Some(path) = uri.path().strip_suffix('/') {
        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(if let Some(query) = uri.query() {
            format!("{}?{}", path, query).parse().unwrap()
        } else {
            path.parse().unwrap()
        });

        let new_uri = Uri::from_parts(parts).unwrap();

        Redirect::permanent(&new_uri.to_string()).into_response()
    } else {
        next.run(req).await
    }
}
