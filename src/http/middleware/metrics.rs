//! Per-route request metrics.

use std::time::Instant;

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};

use crate::observability::metrics;

/// Label used for requests that matched no route.
const UNMATCHED: &str = "unmatched";

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;
    metrics::record_request(&route, &method, response.status().as_u16(), start);
    response
}
