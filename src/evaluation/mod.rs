//! Product evaluation through a hosted language model.
//!
//! # Data Flow
//! ```text
//! admitted request body
//!     → prompt.rs (Product, required-field check, chat messages)
//!     → model.rs (POST chat completion, bounded by timeout)
//!     → parse.rs (first JSON object → Evaluation)
//!     → on any failure: FallbackEvaluation with HTTP 500
//! ```

pub mod model;
pub mod parse;
pub mod prompt;

pub use model::{ModelClient, ModelError};
pub use parse::{parse_evaluation, Decision, Evaluation, EvaluationError, FallbackEvaluation};
pub use prompt::{build_messages, ChatMessage, Product};
