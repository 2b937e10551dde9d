//! Best-effort audit logging to an external sink.
//!
//! Records are dispatched on a detached task. The caller never waits for the
//! sink and never learns whether delivery worked; failures are logged and
//! counted in `gateway_audit_dispatch_failures_total`.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::admission::decision::{AdmissionDecision, AdmissionRequest, SecurityContext};
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::observability::metrics;

/// What the request finally produced. Handlers put one of these in the
/// response extensions; rejections use `RequestOutcome::rejected`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOutcome {
    pub success: bool,
    pub score: Option<u8>,
    pub decision: Option<String>,
}

impl RequestOutcome {
    pub fn succeeded(score: u8, decision: impl Into<String>) -> Self {
        Self {
            success: true,
            score: Some(score),
            decision: Some(decision.into()),
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn rejected() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub session_id: String,
    pub request: AuditRequest,
    pub response: AuditResponse,
    pub security: Option<SecurityContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRequest {
    pub method: String,
    pub path: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResponse {
    pub success: bool,
    pub score: Option<u8>,
    pub decision: Option<String>,
}

impl AuditRecord {
    /// `decision` is `None` for requests rejected before a decision existed.
    pub fn new(
        request: &AdmissionRequest,
        decision: Option<&AdmissionDecision>,
        outcome: &RequestOutcome,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            session_id: request.session_id().to_string(),
            request: AuditRequest {
                method: request.method().to_string(),
                path: request.path().to_string(),
                ip: request.client_addr().map(|ip| ip.to_string()),
                user_agent: request.user_agent().map(str::to_string),
            },
            response: AuditResponse {
                success: outcome.success,
                score: outcome.score,
                decision: outcome.decision.clone(),
            },
            security: decision.and_then(AdmissionDecision::security_context),
        }
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    client: reqwest::Client,
    /// `None` when auditing is disabled.
    endpoint: Option<String>,
    timeout: Duration,
}

impl AuditLogger {
    pub fn new(config: &AuditConfig, client: reqwest::Client) -> Self {
        let endpoint = config
            .enabled
            .then(|| format!("{}/log", config.sink_url.trim_end_matches('/')));

        Self {
            client,
            endpoint,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Start auditing `request`; see `AuditGuard`.
    pub fn guard(&self, request: AdmissionRequest) -> AuditGuard {
        AuditGuard {
            logger: self.clone(),
            request,
            decision: None,
            done: false,
        }
    }

    /// Dispatch a record without waiting for it.
    ///
    /// Returns the handle of the detached task, or `None` when disabled.
    /// Dropping the handle does not cancel the dispatch.
    pub fn log_audit(
        &self,
        request: &AdmissionRequest,
        decision: Option<&AdmissionDecision>,
        outcome: &RequestOutcome,
    ) -> Option<JoinHandle<()>> {
        let endpoint = self.endpoint.clone()?;
        let record = AuditRecord::new(request, decision, outcome);
        let client = self.client.clone();
        let timeout = self.timeout;

        Some(tokio::spawn(async move {
            if let Err(e) = dispatch(&client, &endpoint, &record, timeout).await {
                tracing::warn!(
                    error = %e,
                    session_id = %record.session_id,
                    "Audit logging failed"
                );
                metrics::record_audit_failure();
            }
        }))
    }
}

/// Audits one request exactly once.
///
/// `complete` dispatches the final outcome. A guard dropped before that
/// (outer timeout, client disconnect) dispatches a failed outcome instead.
pub struct AuditGuard {
    logger: AuditLogger,
    request: AdmissionRequest,
    decision: Option<AdmissionDecision>,
    done: bool,
}

impl AuditGuard {
    pub fn request(&self) -> &AdmissionRequest {
        &self.request
    }

    pub fn set_decision(&mut self, decision: AdmissionDecision) {
        self.decision = Some(decision);
    }

    pub fn complete(mut self, outcome: &RequestOutcome) -> Option<JoinHandle<()>> {
        self.done = true;
        self.logger
            .log_audit(&self.request, self.decision.as_ref(), outcome)
    }
}

impl Drop for AuditGuard {
    fn drop(&mut self) {
        if self.done || tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        tracing::warn!(
            session_id = %self.request.session_id(),
            "Request abandoned before completion"
        );
        self.logger
            .log_audit(&self.request, self.decision.as_ref(), &RequestOutcome::failed());
    }
}

async fn dispatch(
    client: &reqwest::Client,
    endpoint: &str,
    record: &AuditRecord,
    timeout: Duration,
) -> Result<(), AuditError> {
    let send = client.post(endpoint).json(record).send();
    let response = tokio::time::timeout(timeout, send)
        .await
        .map_err(|_| AuditError::Timeout(timeout.as_millis() as u64))??;

    let status = response.status();
    if !status.is_success() {
        return Err(AuditError::Status(status.as_u16()));
    }
    Ok(())
}
