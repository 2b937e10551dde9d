//! Where finished evaluations go after the response is decided.
//!
//! # Data Flow
//! ```text
//! successful evaluation
//!     → EvaluationRecord
//!     → mongo.rs (insert into the history collection)
//!     → kafka.rs (event keyed by product name)
//! ```
//!
//! Both sinks are optional and run on detached tasks. A failing sink is
//! logged and counted in `gateway_sink_failures_total`; the client response
//! never depends on it.

pub mod kafka;
pub mod mongo;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::admission::SecurityContext;
use crate::config::{PersistenceConfig, PublishingConfig};
use crate::evaluation::Product;
use crate::observability::metrics;

pub use kafka::{EvaluationEvent, EventPublisher};
pub use mongo::HistoryStore;

/// One stored evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub product: Product,
    pub evaluation: Value,
    pub raw_model_response: String,
    pub timestamp: String,
    pub agent_version: String,
    pub security: Option<SecurityContext>,
}

impl EvaluationRecord {
    pub fn new(
        product: Product,
        evaluation: Value,
        raw_model_response: String,
        agent_version: impl Into<String>,
        security: Option<SecurityContext>,
    ) -> Self {
        Self {
            product,
            evaluation,
            raw_model_response,
            timestamp: chrono::Utc::now().to_rfc3339(),
            agent_version: agent_version.into(),
            security,
        }
    }
}

/// The configured sinks for one configuration generation.
#[derive(Clone, Default)]
pub struct EvaluationSinks {
    history: Option<Arc<HistoryStore>>,
    events: Option<Arc<EventPublisher>>,
}

impl EvaluationSinks {
    pub fn new(persistence: &PersistenceConfig, publishing: &PublishingConfig) -> Self {
        Self {
            history: persistence
                .enabled
                .then(|| Arc::new(HistoryStore::new(persistence))),
            events: publishing
                .enabled
                .then(|| Arc::new(EventPublisher::new(publishing))),
        }
    }

    /// Sinks for a new configuration. A sink whose settings did not change
    /// is shared, connection included.
    pub fn reconfigured(&self, persistence: &PersistenceConfig, publishing: &PublishingConfig) -> Self {
        let fresh = Self::new(persistence, publishing);
        Self {
            history: match (&self.history, fresh.history) {
                (Some(current), Some(_)) if current.config() == persistence => Some(current.clone()),
                (_, history) => history,
            },
            events: match (&self.events, fresh.events) {
                (Some(current), Some(_)) if current.config() == publishing => Some(current.clone()),
                (_, events) => events,
            },
        }
    }

    pub fn persistence_enabled(&self) -> bool {
        self.history.is_some()
    }

    pub fn publishing_enabled(&self) -> bool {
        self.events.is_some()
    }

    /// Hand `record` to every enabled sink without waiting.
    ///
    /// Returns the handles of the detached tasks; dropping them does not
    /// cancel delivery.
    pub fn record(&self, record: EvaluationRecord) -> Vec<JoinHandle<()>> {
        let record = Arc::new(record);
        let mut handles = Vec::new();

        if let Some(history) = self.history.clone() {
            let record = record.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = history.store(&record).await {
                    tracing::warn!(error = %e, "Failed to store evaluation history");
                    metrics::record_sink_failure("mongodb", e.kind());
                }
            }));
        }

        if let Some(events) = self.events.clone() {
            handles.push(tokio::spawn(async move {
                let event = EvaluationEvent::from_record(&record);
                if let Err(e) = events.publish(&event).await {
                    tracing::warn!(error = %e, key = %event.key(), "Failed to publish evaluation event");
                    metrics::record_sink_failure("kafka", e.kind());
                }
            }));
        }

        handles
    }
}
