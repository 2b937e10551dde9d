//! Catalog evaluation gateway library.
//!
//! An HTTP service that evaluates product submissions with a language model,
//! guarded by an admission pipeline (rate limiting, external security
//! validation, audit logging). Finished evaluations can be stored in MongoDB
//! and published to Kafka.

pub mod admission;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod sinks;

pub use admission::{AdmissionDecision, AdmissionPipeline, AdmissionRequest, FailurePolicy};
pub use config::schema::GatewayConfig;
pub use error::AdmissionError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
