//! Admission pipeline: rate limiter, then security validator, then audit.

use std::time::Instant;

use crate::admission::audit::{AuditGuard, AuditLogger};
use crate::admission::decision::{AdmissionDecision, AdmissionRequest};
use crate::admission::rate_limit::{RateLimitSettings, RateLimiter};
use crate::admission::validator::SecurityValidator;
use crate::config::GatewayConfig;
use crate::error::AdmissionError;
use crate::observability::metrics;

/// The admission guard for one configuration generation.
#[derive(Clone)]
pub struct AdmissionPipeline {
    rate_limiter: RateLimiter,
    rate_limit_enabled: bool,
    validator: SecurityValidator,
    audit: AuditLogger,
}

impl AdmissionPipeline {
    /// Build a pipeline with a fresh rate-limit store.
    pub fn new(config: &GatewayConfig, client: reqwest::Client) -> Self {
        let rate_limiter = RateLimiter::new(RateLimitSettings::from(&config.rate_limit));
        Self::assemble(config, client, rate_limiter)
    }

    /// Build a pipeline for a new configuration that keeps this pipeline's
    /// rate-limit counters.
    pub fn reconfigured(&self, config: &GatewayConfig, client: reqwest::Client) -> Self {
        let rate_limiter = self
            .rate_limiter
            .reconfigured(RateLimitSettings::from(&config.rate_limit));
        Self::assemble(config, client, rate_limiter)
    }

    fn assemble(config: &GatewayConfig, client: reqwest::Client, rate_limiter: RateLimiter) -> Self {
        Self {
            rate_limiter,
            rate_limit_enabled: config.rate_limit.enabled,
            validator: SecurityValidator::new(&config.security, client.clone()),
            audit: AuditLogger::new(&config.audit, client),
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit_enabled
    }

    pub fn validator(&self) -> &SecurityValidator {
        &self.validator
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Run every admission stage, stopping at the first rejection.
    pub async fn admit(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AdmissionError> {
        self.check_rate_limit(request, Instant::now())?;
        self.validator.validate(request).await
    }

    /// Rate-limit stage alone, evaluated at `now`.
    pub fn check_rate_limit(&self, request: &AdmissionRequest, now: Instant) -> Result<(), AdmissionError> {
        if !self.rate_limit_enabled {
            return Ok(());
        }

        let key = request.client_key();
        let outcome = self.rate_limiter.check_and_record(&key, now);
        let settings = self.rate_limiter.settings();

        if outcome.allowed {
            tracing::debug!(
                client = %key,
                count = outcome.count,
                limit = settings.max_requests,
                "Rate limit check passed"
            );
            Ok(())
        } else {
            tracing::warn!(client = %key, count = outcome.count, "Rate limit exceeded");
            metrics::record_rate_limited();
            Err(AdmissionError::RateLimitExceeded {
                limit: settings.max_requests,
                window_ms: settings.window.as_millis() as u64,
                current_count: outcome.count,
            })
        }
    }

    /// Start auditing `request`. The guard reports the final outcome, or a
    /// failure if the request is abandoned.
    pub fn begin_audit(&self, request: AdmissionRequest) -> AuditGuard {
        self.audit.guard(request)
    }
}
