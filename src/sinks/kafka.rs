//! Evaluation events on a Kafka topic.

use std::collections::BTreeMap;
use std::time::Duration;

use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use rskafka::record::Record;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::PublishingConfig;
use crate::error::SinkError;
use crate::evaluation::Product;
use crate::sinks::EvaluationRecord;

/// Message value published for each evaluation. Keyed by product name.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationEvent {
    #[serde(skip)]
    key: String,
    pub product: Product,
    pub evaluation: Value,
    pub timestamp: String,
    pub intercepted: bool,
}

impl EvaluationEvent {
    pub fn from_record(record: &EvaluationRecord) -> Self {
        Self {
            key: record
                .product
                .product_name()
                .unwrap_or_else(|| "unknown".to_string()),
            product: record.product.clone(),
            evaluation: record.evaluation.clone(),
            timestamp: record.timestamp.clone(),
            intercepted: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn into_record(self) -> Result<Record, SinkError> {
        let value = serde_json::to_vec(&self)?;
        Ok(Record {
            key: Some(self.key.into_bytes()),
            value: Some(value),
            headers: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
        })
    }
}

/// Produces evaluation events to one topic partition.
///
/// Connects on first publish and keeps the partition client afterwards.
pub struct EventPublisher {
    config: PublishingConfig,
    timeout: Duration,
    partition: OnceCell<PartitionClient>,
}

impl EventPublisher {
    pub fn new(config: &PublishingConfig) -> Self {
        Self {
            config: config.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            partition: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &PublishingConfig {
        &self.config
    }

    async fn partition(&self) -> Result<&PartitionClient, SinkError> {
        self.partition
            .get_or_try_init(|| async {
                let client = ClientBuilder::new(self.config.brokers.clone()).build().await?;
                let partition = client
                    .partition_client(
                        self.config.topic.clone(),
                        self.config.partition,
                        UnknownTopicHandling::Error,
                    )
                    .await?;
                tracing::debug!(
                    topic = %self.config.topic,
                    partition = self.config.partition,
                    "Evaluation event publisher connected"
                );
                Ok::<_, SinkError>(partition)
            })
            .await
    }

    /// Publish `event`, bounded by the configured timeout.
    pub async fn publish(&self, event: &EvaluationEvent) -> Result<(), SinkError> {
        let record = event.clone().into_record()?;
        let produce = async {
            self.partition()
                .await?
                .produce(vec![record], Compression::NoCompression)
                .await?;
            Ok::<_, SinkError>(())
        };

        tokio::time::timeout(self.timeout, produce)
            .await
            .map_err(|_| SinkError::Timeout(self.timeout.as_millis() as u64))?
    }
}
