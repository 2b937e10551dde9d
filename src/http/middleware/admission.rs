//! Admission guard middleware.

use axum::{
    body::Body,
    extract::State,
    http::{header::USER_AGENT, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::admission::{AdmissionRequest, RequestOutcome};
use crate::http::request::{client_addr, header_value, request_id, X_SESSION_ID};
use crate::http::response::json_error;
use crate::http::server::AppState;

/// Admit the request or reject it; audit the final outcome either way.
///
/// The buffered body is handed back to the handler unchanged. The decision
/// is inserted into the request extensions. If this future is dropped early
/// the audit guard still records the request as failed.
pub async fn admission_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let runtime = state.current();
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, runtime.config.listener.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => return json_error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"),
    };
    let payload = serde_json::from_slice::<Value>(&bytes).unwrap_or(Value::Null);

    let admission = AdmissionRequest::new(
        payload,
        client_addr(&parts.extensions),
        header_value(&parts.headers, X_SESSION_ID),
        header_value(&parts.headers, USER_AGENT.as_str()),
        parts.method.as_str(),
        parts.uri.path(),
    );
    let request_id = request_id(&parts.headers);
    let mut audit = runtime.pipeline.begin_audit(admission);

    match runtime.pipeline.admit(audit.request()).await {
        Ok(decision) => {
            tracing::debug!(
                request_id = %request_id,
                session_id = %decision.session_id(),
                fallback = decision.fallback(),
                "Request admitted"
            );
            audit.set_decision(decision.clone());

            let mut request = Request::from_parts(parts, Body::from(bytes));
            request.extensions_mut().insert(decision);
            let response = next.run(request).await;

            let outcome = response
                .extensions()
                .get::<RequestOutcome>()
                .cloned()
                .unwrap_or_else(|| RequestOutcome {
                    success: response.status().is_success(),
                    ..RequestOutcome::default()
                });
            audit.complete(&outcome);
            response
        }
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id,
                session_id = %audit.request().session_id(),
                reason = rejection.reason(),
                status = rejection.status().as_u16(),
                "Request rejected at admission"
            );
            audit.complete(&RequestOutcome::rejected());
            rejection.into_response()
        }
    }
}
