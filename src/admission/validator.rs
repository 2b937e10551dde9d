//! Security validation against an external policy service.
//!
//! # Responsibilities
//! - Wrap the request in a JSON-RPC style envelope
//! - POST it to `<service_url>/validate` with a bounded timeout
//! - Turn the policy answer into a decision or a rejection
//! - Fail open or closed when the service cannot be reached

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tokio::time::timeout;

use crate::admission::decision::{AdmissionDecision, AdmissionRequest};
use crate::config::SecurityConfig;
use crate::error::{AdmissionError, PolicyError};
use crate::observability::metrics;

const TOOL_NAME: &str = "product_evaluation";

/// What to do when the policy service fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Let the request through, marked as unvalidated.
    FailOpen,
    /// Reject with 503.
    FailClosed,
}

impl FailurePolicy {
    /// Exactly `"strict"` selects fail-closed; every other mode fails open.
    pub fn from_mode(mode: &str) -> Self {
        if mode == "strict" {
            FailurePolicy::FailClosed
        } else {
            FailurePolicy::FailOpen
        }
    }
}

/// Envelope sent to `POST /validate`.
#[derive(Debug, Serialize)]
pub struct PolicyRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: &'static str,
    pub params: PolicyParams<'a>,
    pub meta: PolicyMeta<'a>,
}

#[derive(Debug, Serialize)]
pub struct PolicyParams<'a> {
    pub name: &'static str,
    pub arguments: &'a Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyMeta<'a> {
    pub session_id: &'a str,
    pub user_agent: Option<&'a str>,
    pub timestamp: String,
}

impl<'a> PolicyRequest<'a> {
    pub fn for_request(request: &'a AdmissionRequest) -> Self {
        Self {
            jsonrpc: "2.0",
            id: format!("agent-{}", uuid::Uuid::new_v4()),
            method: "tools/call",
            params: PolicyParams {
                name: TOOL_NAME,
                arguments: request.payload(),
            },
            meta: PolicyMeta {
                session_id: request.session_id(),
                user_agent: request.user_agent(),
                timestamp: request.received_at().to_rfc3339(),
            },
        }
    }
}

/// Answer from `POST /validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyResponse {
    pub allowed: bool,
    /// Relayed exactly as received. Absent or null reads as 0.
    #[serde(default)]
    pub risk_score: Option<Number>,
    #[serde(default)]
    pub blocked_reasons: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Client for the policy service.
#[derive(Clone)]
pub struct SecurityValidator {
    client: reqwest::Client,
    /// `None` when validation is disabled.
    endpoint: Option<String>,
    timeout: Duration,
    policy: FailurePolicy,
}

impl SecurityValidator {
    pub fn new(config: &SecurityConfig, client: reqwest::Client) -> Self {
        let endpoint = config.enabled.then(|| {
            format!("{}/validate", config.service_url.trim_end_matches('/'))
        });

        Self {
            client,
            endpoint,
            timeout: Duration::from_millis(config.timeout_ms),
            policy: FailurePolicy::from_mode(&config.mode),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Decide whether the request may proceed.
    ///
    /// Disabled validators allow everything without a network call.
    pub async fn validate(
        &self,
        request: &AdmissionRequest,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let Some(endpoint) = &self.endpoint else {
            metrics::record_security_decision("skipped");
            return Ok(AdmissionDecision::unchecked(request.session_id()));
        };

        let envelope = PolicyRequest::for_request(request);
        tracing::debug!(
            session_id = %request.session_id(),
            envelope_id = %envelope.id,
            "Validating request"
        );

        match self.call(endpoint, &envelope).await {
            Ok(answer) if answer.allowed => {
                let risk_score = answer.risk_score.unwrap_or_else(|| Number::from(0));
                tracing::info!(
                    session_id = %request.session_id(),
                    risk_score = %risk_score,
                    "Request allowed by policy service"
                );
                metrics::record_security_decision("allowed");
                Ok(AdmissionDecision::from_policy(
                    true,
                    risk_score,
                    answer.blocked_reasons,
                    request.session_id(),
                ))
            }
            Ok(answer) => {
                let risk_score = answer.risk_score.unwrap_or_else(|| Number::from(0));
                tracing::warn!(
                    session_id = %request.session_id(),
                    risk_score = %risk_score,
                    reasons = ?answer.blocked_reasons,
                    "Request blocked by policy service"
                );
                metrics::record_security_decision("blocked");
                Err(AdmissionError::SecurityBlocked {
                    risk_score,
                    blocked_reasons: answer.blocked_reasons,
                    message: answer.message,
                    session_id: request.session_id().to_string(),
                })
            }
            Err(e) => {
                metrics::record_policy_failure(e.kind());
                match self.policy {
                    FailurePolicy::FailClosed => {
                        tracing::error!(error = %e, "Policy service failed, rejecting request");
                        metrics::record_security_decision("unavailable");
                        Err(AdmissionError::SecurityServiceUnavailable)
                    }
                    FailurePolicy::FailOpen => {
                        tracing::warn!(error = %e, "Policy service failed, allowing unvalidated request");
                        metrics::record_security_decision("fallback");
                        Ok(AdmissionDecision::fail_open(request.session_id()))
                    }
                }
            }
        }
    }

    async fn call(
        &self,
        endpoint: &str,
        envelope: &PolicyRequest<'_>,
    ) -> Result<PolicyResponse, PolicyError> {
        let attempt = async {
            let response = self.client.post(endpoint).json(envelope).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(PolicyError::Status(status.as_u16()));
            }
            Ok::<_, PolicyError>(response.json::<PolicyResponse>().await?)
        };

        match timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(PolicyError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}
