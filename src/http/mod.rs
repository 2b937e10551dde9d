//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, runtime state)
//!     → request.rs (request ID, session header, peer address)
//!     → middleware.rs (admission guard on /products/evaluate)
//!     → handlers.rs (health, product evaluation)
//!     → response.rs (JSON error bodies, outcome for the audit log)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{X_REQUEST_ID, X_SESSION_ID};
pub use server::{AppState, HttpServer, Runtime};
