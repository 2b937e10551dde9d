//! Route handlers.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Number, Value};

use crate::admission::{AdmissionDecision, RequestOutcome};
use crate::evaluation::{
    build_messages, parse_evaluation, Evaluation, EvaluationError, FallbackEvaluation, Product,
};
use crate::http::response::with_outcome;
use crate::http::server::AppState;
use crate::sinks::EvaluationRecord;

const AGENT_NAME: &str = concat!("catalog-gateway/", env!("CARGO_PKG_VERSION"));

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let runtime = state.current();
    let security_enabled = runtime.pipeline.validator().is_enabled();

    Json(json!({
        "status": "healthy",
        "service": "catalog-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model_runner_url": runtime.model.base_url(),
        "model": runtime.model.model(),
        "threshold": runtime.config.model.evaluation_threshold,
        "security_enabled": security_enabled,
        "interceptors": {
            "security": security_enabled,
            "rate_limiting": runtime.pipeline.rate_limit_enabled(),
            "audit": runtime.pipeline.audit().is_enabled(),
            "persistence": runtime.sinks.persistence_enabled(),
            "publishing": runtime.sinks.publishing_enabled(),
        }
    }))
}

/// Evaluation as returned to clients.
#[derive(Serialize)]
struct EvaluationReport<'a> {
    #[serde(flatten)]
    evaluation: &'a Evaluation,
    processing_time_ms: u64,
    intercepted: bool,
    security_score: &'a Number,
}

/// Evaluate a product with the model. Only reachable through the admission
/// middleware, which supplies the decision.
pub async fn evaluate(
    State(state): State<AppState>,
    Extension(decision): Extension<AdmissionDecision>,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let runtime = state.current();
    let threshold = runtime.config.model.evaluation_threshold;

    let product = Product::from_body(&body);
    if !product.is_complete() {
        let response = (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Missing required fields: productName and description are required",
            })),
        )
            .into_response();
        return with_outcome(response, RequestOutcome::failed());
    }

    tracing::info!(
        product = %product.product_name().unwrap_or_default(),
        session_id = %decision.session_id(),
        "New product evaluation request"
    );

    let messages = build_messages(&product, threshold);
    let result: Result<(Evaluation, String), EvaluationError> =
        match runtime.model.complete(&messages).await {
            Ok(reply) => parse_evaluation(&reply, threshold).map(|evaluation| (evaluation, reply)),
            Err(e) => Err(e.into()),
        };
    let processing_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok((evaluation, reply)) => {
            tracing::info!(
                score = evaluation.score,
                decision = evaluation.decision.as_str(),
                security_risk = %decision.risk_score(),
                processing_time_ms,
                "Evaluation complete"
            );

            let outcome = RequestOutcome::succeeded(evaluation.score, evaluation.decision.as_str());
            let report = EvaluationReport {
                evaluation: &evaluation,
                processing_time_ms,
                intercepted: true,
                security_score: decision.risk_score(),
            };
            let report = serde_json::to_value(&report).unwrap_or(Value::Null);
            runtime.sinks.record(EvaluationRecord::new(
                product,
                report.clone(),
                reply,
                AGENT_NAME,
                decision.security_context(),
            ));

            let response = Json(json!({
                "success": true,
                "evaluation": report,
                "metadata": {
                    "processing_time_ms": processing_time_ms,
                    "agent": AGENT_NAME,
                    "model": runtime.model.model(),
                    "endpoint": runtime.model.base_url(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "intercepted": true,
                    "security": decision.security_context(),
                }
            }))
            .into_response();
            with_outcome(response, outcome)
        }
        Err(e) => {
            tracing::error!(error = %e, processing_time_ms, "Evaluation failed, returning fallback");

            let response = (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "fallback_evaluation": FallbackEvaluation::new(processing_time_ms),
                    "metadata": {
                        "error_occurred": true,
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                        "suggested_action": "Check the model runner service and try again",
                        "intercepted": true,
                    }
                })),
            )
                .into_response();
            with_outcome(response, RequestOutcome::failed())
        }
    }
}
