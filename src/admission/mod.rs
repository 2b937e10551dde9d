//! Request admission guard.
//!
//! # Data Flow
//! ```text
//! Incoming evaluation request:
//!     → decision.rs (build AdmissionRequest: payload, client key, session id)
//!     → pipeline.rs
//!         → rate_limit.rs (per-client rolling window)      reject: 429
//!         → validator.rs  (external policy service)        reject: 403 / 503
//!     → AdmissionDecision attached to the request
//!     → handler runs
//!     → audit.rs (detached dispatch of the final outcome)
//! ```
//!
//! # Design Decisions
//! - Stages short-circuit on the first rejection
//! - No retries: every external call is attempted once per request
//! - Policy service failures fail open or closed per `FailurePolicy`
//! - Audit failures never reach the response path
//! - Client key is the peer address; it is unauthenticated and shared
//!   behind NAT

pub mod audit;
pub mod decision;
pub mod pipeline;
pub mod rate_limit;
pub mod validator;

pub use audit::{AuditGuard, AuditLogger, AuditRecord, RequestOutcome};
pub use decision::{AdmissionDecision, AdmissionRequest, SecurityContext};
pub use pipeline::AdmissionPipeline;
pub use rate_limit::{RateLimitOutcome, RateLimitSettings, RateLimiter};
pub use validator::{FailurePolicy, SecurityValidator};
