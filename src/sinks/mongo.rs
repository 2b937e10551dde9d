//! Evaluation history in MongoDB.

use std::time::Duration;

use mongodb::bson::Document;
use mongodb::{Client, Collection};
use tokio::sync::OnceCell;

use crate::config::PersistenceConfig;
use crate::error::SinkError;
use crate::sinks::EvaluationRecord;

/// Inserts evaluation records into one collection.
///
/// The client is created on first use, so a database that is down at
/// startup only costs the records written while it is down.
pub struct HistoryStore {
    config: PersistenceConfig,
    timeout: Duration,
    collection: OnceCell<Collection<Document>>,
}

impl HistoryStore {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            config: config.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            collection: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    async fn collection(&self) -> Result<&Collection<Document>, SinkError> {
        self.collection
            .get_or_try_init(|| async {
                let client = Client::with_uri_str(&self.config.mongodb_url).await?;
                tracing::debug!(
                    database = %self.config.database,
                    collection = %self.config.collection,
                    "Evaluation history store connected"
                );
                Ok::<_, SinkError>(
                    client
                        .database(&self.config.database)
                        .collection::<Document>(&self.config.collection),
                )
            })
            .await
    }

    /// Insert `record`, bounded by the configured timeout.
    pub async fn store(&self, record: &EvaluationRecord) -> Result<(), SinkError> {
        let document = mongodb::bson::to_document(record)?;
        let insert = async {
            self.collection().await?.insert_one(document).await?;
            Ok::<_, SinkError>(())
        };

        tokio::time::timeout(self.timeout, insert)
            .await
            .map_err(|_| SinkError::Timeout(self.timeout.as_millis() as u64))?
    }
}
