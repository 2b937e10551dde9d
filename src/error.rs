//! Error types for the gateway.
//!
//! # Taxonomy
//! - `AdmissionError`: terminal rejections produced by the admission guard.
//!   These are the only errors a client ever sees from the guard.
//! - `PolicyError`: policy service call failures. Mapped to a fallback
//!   decision or to `AdmissionError::SecurityServiceUnavailable` depending
//!   on the configured `FailurePolicy`.
//! - `AuditError`: audit sink dispatch failures. Always swallowed.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Number};

/// A request rejected by the admission guard.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdmissionError {
    #[error("rate limit exceeded ({current_count}/{limit} in {window_ms}ms)")]
    RateLimitExceeded {
        limit: usize,
        window_ms: u64,
        current_count: usize,
    },

    #[error("request blocked by security interceptor (risk score {risk_score})")]
    SecurityBlocked {
        risk_score: Number,
        blocked_reasons: Vec<String>,
        message: Option<String>,
        session_id: String,
    },

    #[error("security service unavailable")]
    SecurityServiceUnavailable,
}

impl AdmissionError {
    /// HTTP status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            AdmissionError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AdmissionError::SecurityBlocked { .. } => StatusCode::FORBIDDEN,
            AdmissionError::SecurityServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable reason, used for metrics labels and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            AdmissionError::SecurityBlocked { .. } => "security_blocked",
            AdmissionError::SecurityServiceUnavailable => "security_service_unavailable",
        }
    }

    /// JSON body of the rejection response.
    pub fn body(&self) -> serde_json::Value {
        match self {
            AdmissionError::RateLimitExceeded {
                limit,
                window_ms,
                current_count,
            } => json!({
                "success": false,
                "error": "Rate limit exceeded",
                "details": {
                    "limit": limit,
                    "window_ms": window_ms,
                    "current_count": current_count,
                }
            }),
            AdmissionError::SecurityBlocked {
                risk_score,
                blocked_reasons,
                message,
                session_id,
            } => json!({
                "success": false,
                "error": "Request blocked by security interceptor",
                "details": {
                    "risk_score": risk_score,
                    "blocked_reasons": blocked_reasons,
                    "message": message.as_deref().unwrap_or("Security validation failed"),
                },
                "metadata": {
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "session_id": session_id,
                }
            }),
            AdmissionError::SecurityServiceUnavailable => json!({
                "success": false,
                "error": "Security service unavailable - request blocked",
                "details": {
                    "message": "Security validation service is not responding",
                    "strict_mode": true,
                }
            }),
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Failure talking to the external policy service.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy service timed out after {0}ms")]
    Timeout(u64),

    #[error("policy service transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("policy service returned status {0}")]
    Status(u16),
}

impl PolicyError {
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyError::Timeout(_) => "timeout",
            PolicyError::Transport(e) if e.is_decode() => "decode",
            PolicyError::Transport(_) => "transport",
            PolicyError::Status(_) => "status",
        }
    }
}

/// Failure dispatching an audit record. Never surfaced to clients.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink timed out after {0}ms")]
    Timeout(u64),

    #[error("audit sink transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("audit sink returned status {0}")]
    Status(u16),
}

/// Failure storing or publishing a finished evaluation. Never surfaced to
/// clients.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("document encoding error: {0}")]
    Document(#[from] mongodb::bson::ser::Error),

    #[error("kafka error: {0}")]
    Kafka(#[from] rskafka::client::error::Error),

    #[error("payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl SinkError {
    pub fn kind(&self) -> &'static str {
        match self {
            SinkError::Timeout(_) => "timeout",
            SinkError::Mongo(_) | SinkError::Kafka(_) => "transport",
            SinkError::Document(_) | SinkError::Payload(_) => "encode",
        }
    }
}
