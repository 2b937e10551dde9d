//! Response helpers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::admission::RequestOutcome;

/// `{success: false, error: <message>}` with the given status.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

/// Attach the handler outcome read by the audit logger.
pub fn with_outcome(mut response: Response, outcome: RequestOutcome) -> Response {
    response.extensions_mut().insert(outcome);
    response
}

/// Fallback for unknown routes.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
        .into_response()
}
