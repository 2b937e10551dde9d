//! Admission inputs and outputs.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Number, Value};

/// Client key used when the peer address is not known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Session id used when neither a session header nor a peer address exists.
pub const ANONYMOUS_SESSION: &str = "anonymous";

/// An inbound request as seen by the admission guard. Immutable once built.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    payload: Value,
    client_addr: Option<IpAddr>,
    session_id: String,
    user_agent: Option<String>,
    method: String,
    path: String,
    received_at: DateTime<Utc>,
}

impl AdmissionRequest {
    /// Build a request. The session id is the `x-session-id` header when
    /// present and non-empty, else the client address, else `"anonymous"`.
    pub fn new(
        payload: Value,
        client_addr: Option<IpAddr>,
        session_header: Option<&str>,
        user_agent: Option<&str>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let session_id = match session_header.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => client_addr
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| ANONYMOUS_SESSION.to_string()),
        };

        Self {
            payload,
            client_addr,
            session_id,
            user_agent: user_agent.map(str::to_string),
            method: method.into(),
            path: path.into(),
            received_at: Utc::now(),
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Rate-limit bucket key.
    pub fn client_key(&self) -> String {
        self.client_addr
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    pub fn client_addr(&self) -> Option<IpAddr> {
        self.client_addr
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Outcome of admission for a request that was let through.
///
/// Computed once per request by the pipeline; fields are read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionDecision {
    allowed: bool,
    validated: bool,
    risk_score: Number,
    blocked_reasons: Vec<String>,
    session_id: String,
    fallback: bool,
}

impl AdmissionDecision {
    /// Security validation is disabled.
    pub(crate) fn unchecked(session_id: &str) -> Self {
        Self {
            allowed: true,
            validated: false,
            risk_score: Number::from(0),
            blocked_reasons: Vec::new(),
            session_id: session_id.to_string(),
            fallback: false,
        }
    }

    /// The policy service answered.
    pub(crate) fn from_policy(
        allowed: bool,
        risk_score: Number,
        blocked_reasons: Vec<String>,
        session_id: &str,
    ) -> Self {
        Self {
            allowed,
            validated: true,
            risk_score,
            blocked_reasons,
            session_id: session_id.to_string(),
            fallback: false,
        }
    }

    /// The policy service failed and the guard fails open.
    pub(crate) fn fail_open(session_id: &str) -> Self {
        Self {
            allowed: true,
            validated: false,
            risk_score: Number::from(0),
            blocked_reasons: Vec::new(),
            session_id: session_id.to_string(),
            fallback: true,
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn validated(&self) -> bool {
        self.validated
    }

    /// Risk score as the policy service reported it; 0 when not validated.
    pub fn risk_score(&self) -> &Number {
        &self.risk_score
    }

    pub fn blocked_reasons(&self) -> &[String] {
        &self.blocked_reasons
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn fallback(&self) -> bool {
        self.fallback
    }

    /// Security metadata exposed to handlers and audit records.
    /// `None` when validation was not attempted.
    pub fn security_context(&self) -> Option<SecurityContext> {
        if self.validated {
            Some(SecurityContext {
                validated: true,
                risk_score: Some(self.risk_score.clone()),
                session_id: Some(self.session_id.clone()),
                fallback: None,
            })
        } else if self.fallback {
            Some(SecurityContext {
                validated: false,
                risk_score: None,
                session_id: None,
                fallback: Some(true),
            })
        } else {
            None
        }
    }
}

/// `{validated, risk_score, session_id}` or `{validated: false, fallback: true}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityContext {
    pub validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}
