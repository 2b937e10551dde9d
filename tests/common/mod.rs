//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{body::Bytes, http::StatusCode, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use catalog_gateway::config::GatewayConfig;
use catalog_gateway::http::HttpServer;
use catalog_gateway::lifecycle::Shutdown;

/// A running mock collaborator.
pub struct MockService {
    pub addr: SocketAddr,
    calls: Arc<AtomicU32>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl MockService {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Request bodies received so far, parsed as JSON.
    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

/// Start a programmable mock service on an ephemeral port.
///
/// Every request, whatever its path, is answered by `f` with the parsed body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockService
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Value)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let handler = {
        let calls = calls.clone();
        let bodies = bodies.clone();
        move |body: Bytes| {
            let f = f.clone();
            let calls = calls.clone();
            let bodies = bodies.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                bodies.lock().unwrap().push(body.clone());
                let (status, reply) = f(body).await;
                (StatusCode::from_u16(status).unwrap(), Json(reply))
            }
        }
    };

    let app = Router::new().fallback(handler);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockService { addr, calls, bodies }
}

/// Mock that always answers `status` with `body`.
pub async fn start_mock_backend(status: u16, body: Value) -> MockService {
    start_programmable_backend(move |_| {
        let body = body.clone();
        async move { (status, body) }
    })
    .await
}

/// Mock that waits `delay` before answering.
pub async fn start_slow_backend(delay: Duration, body: Value) -> MockService {
    start_programmable_backend(move |_| {
        let body = body.clone();
        async move {
            tokio::time::sleep(delay).await;
            (200, body)
        }
    })
    .await
}

/// Address that refuses connections.
pub fn unreachable_url() -> String {
    "http://127.0.0.1:9".to_string()
}

/// Chat completion reply carrying `content`.
pub fn completion(content: &str) -> Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

/// A running gateway.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn evaluate(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/products/evaluate"))
            .json(body)
            .send()
            .await
            .expect("Gateway unreachable")
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway on an ephemeral port with `config`.
pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    start_reloadable_gateway(config).await.0
}

/// Start the gateway and keep the sender for configuration updates.
pub async fn start_reloadable_gateway(
    mut config: GatewayConfig,
) -> (Gateway, mpsc::UnboundedSender<GatewayConfig>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (updates_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    let gateway = Gateway {
        addr,
        shutdown,
        client,
    };
    (gateway, updates_tx)
}

pub fn product() -> Value {
    json!({
        "vendorName": "Acme",
        "productName": "Desk Lamp",
        "description": "Adjustable LED desk lamp",
        "price": 39.99,
        "category": "Home"
    })
}
