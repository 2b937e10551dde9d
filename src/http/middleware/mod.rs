//! Request middleware.
//!
//! `admission` guards handlers behind the admission pipeline.
//! `metrics` records per-route request counts and latency.

pub mod admission;
pub mod metrics;

pub use admission::admission_middleware;
pub use metrics::metrics_middleware;
