//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, body limit, metrics)
//! - Guard the evaluation route with the admission pipeline
//! - Apply configuration updates by swapping runtime state
//! - Sweep idle rate-limit windows in the background

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admission::AdmissionPipeline;
use crate::config::GatewayConfig;
use crate::evaluation::ModelClient;
use crate::http::handlers;
use crate::http::middleware::{admission_middleware, metrics_middleware};
use crate::http::response::not_found;
use crate::sinks::EvaluationSinks;

/// Everything derived from one configuration generation.
pub struct Runtime {
    pub config: GatewayConfig,
    pub pipeline: AdmissionPipeline,
    pub model: ModelClient,
    pub sinks: EvaluationSinks,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    runtime: Arc<ArcSwap<Runtime>>,
    client: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        // Collaborators are internal services.
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_default();

        let runtime = Runtime {
            pipeline: AdmissionPipeline::new(&config, client.clone()),
            model: ModelClient::new(&config.model, client.clone()),
            sinks: EvaluationSinks::new(&config.persistence, &config.publishing),
            config,
        };

        Self {
            runtime: Arc::new(ArcSwap::from_pointee(runtime)),
            client,
        }
    }

    /// Snapshot of the current runtime. Holders keep a consistent view for
    /// the whole request even if a reload happens meanwhile.
    pub fn current(&self) -> Arc<Runtime> {
        self.runtime.load_full()
    }

    /// Replace the runtime with one built from `config`. Rate-limit counters
    /// carry over. Listener, timeout and body-limit settings need a restart.
    pub fn apply(&self, config: GatewayConfig) {
        let current = self.runtime.load();
        if config.listener.bind_address != current.config.listener.bind_address {
            tracing::warn!(
                current = %current.config.listener.bind_address,
                requested = %config.listener.bind_address,
                "Bind address changes require a restart"
            );
        }

        let runtime = Runtime {
            pipeline: current.pipeline.reconfigured(&config, self.client.clone()),
            model: ModelClient::new(&config.model, self.client.clone()),
            sinks: current
                .sinks
                .reconfigured(&config.persistence, &config.publishing),
            config,
        };

        tracing::info!(
            security_enabled = runtime.pipeline.validator().is_enabled(),
            failure_policy = ?runtime.pipeline.validator().policy(),
            rate_limit = runtime.config.rate_limit.max_requests,
            persistence = runtime.sinks.persistence_enabled(),
            publishing = runtime.sinks.publishing_enabled(),
            "Configuration applied"
        );
        self.runtime.store(Arc::new(runtime));
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState::new(config);
        let router = Self::build_router(&state);
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let runtime = state.current();
        let config = &runtime.config;

        let guarded = Router::new()
            .route("/products/evaluate", post(handlers::evaluate))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                admission_middleware,
            ));

        Router::new()
            .route("/health", get(handlers::health))
            .merge(guarded)
            .fallback(not_found)
            .with_state(state.clone())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` apply to requests that
    /// start after they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(apply_updates(
            self.state.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));
        tokio::spawn(sweep_rate_limits(self.state.clone(), shutdown.resubscribe()));

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_updates(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => state.apply(config),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Interval between rate-limit sweeps, read from the live configuration.
fn sweep_interval(state: &AppState) -> Duration {
    Duration::from_secs(state.current().config.rate_limit.sweep_interval_secs.max(1))
}

async fn sweep_rate_limits(state: AppState, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(sweep_interval(&state)) => {
                let removed = state.current().pipeline.rate_limiter().sweep(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, "Swept idle rate limit windows");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn evaluate_request(ip: &str, body: &str) -> Request<Body> {
        let addr: SocketAddr = format!("{}:40000", ip).parse().unwrap();
        let mut request = Request::builder()
            .method("POST")
            .uri("/products/evaluate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let server = HttpServer::new(GatewayConfig::default());
        let response = server
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["interceptors"]["rate_limiting"], true);
        assert_eq!(body["security_enabled"], false);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let server = HttpServer::new(GatewayConfig::default());
        let response = server
            .router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_fields_rejected_after_admission() {
        let server = HttpServer::new(GatewayConfig::default());
        let response = server
            .router()
            .oneshot(evaluate_request("10.9.9.9", r#"{"productName": "Lamp"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_over_quota() {
        let mut config = GatewayConfig::default();
        config.rate_limit.max_requests = 2;
        let server = HttpServer::new(config);

        for _ in 0..2 {
            let response = server
                .router()
                .oneshot(evaluate_request("10.1.1.1", "{}"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = server
            .router()
            .oneshot(evaluate_request("10.1.1.1", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["details"]["limit"], 2);
        assert_eq!(body["details"]["window_ms"], 60000);
        assert_eq!(body["details"]["current_count"], 2);

        // A different client is unaffected.
        let response = server
            .router()
            .oneshot(evaluate_request("10.1.1.2", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_sweep_interval_follows_reload() {
        let server = HttpServer::new(GatewayConfig::default());
        assert_eq!(sweep_interval(server.state()), Duration::from_secs(60));

        let mut config = GatewayConfig::default();
        config.rate_limit.sweep_interval_secs = 5;
        server.state().apply(config);
        assert_eq!(sweep_interval(server.state()), Duration::from_secs(5));

        let mut config = GatewayConfig::default();
        config.rate_limit.sweep_interval_secs = 0;
        server.state().apply(config);
        assert_eq!(sweep_interval(server.state()), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_apply_keeps_counters_and_changes_limits() {
        let mut config = GatewayConfig::default();
        config.rate_limit.max_requests = 5;
        let server = HttpServer::new(config.clone());

        for _ in 0..2 {
            server
                .router()
                .oneshot(evaluate_request("10.2.2.2", "{}"))
                .await
                .unwrap();
        }

        config.rate_limit.max_requests = 2;
        server.state().apply(config);

        let response = server
            .router()
            .oneshot(evaluate_request("10.2.2.2", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
