//! Client for an OpenAI-compatible chat completions endpoint.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::config::ModelConfig;
use crate::evaluation::prompt::ChatMessage;
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model runner timed out after {0}s")]
    Timeout(u64),

    #[error("model runner request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model runner returned status {0}")]
    Status(u16),

    #[error("model runner returned no choices")]
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Clone)]
pub struct ModelClient {
    client: reqwest::Client,
    base_url: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl ModelClient {
    pub fn new(config: &ModelConfig, client: reqwest::Client) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            client,
            endpoint: format!("{}{}", base_url, config.completions_path),
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the conversation and return the first choice's content.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let start = Instant::now();
        let result = self.request(messages).await;
        metrics::record_model_call(if result.is_ok() { "ok" } else { "error" }, start);

        match &result {
            Ok(content) => tracing::debug!(
                model = %self.model,
                chars = content.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Model call completed"
            ),
            Err(e) => tracing::error!(model = %self.model, error = %e, "Model call failed"),
        }
        result
    }

    async fn request(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let call = async {
            let response = self.client.post(&self.endpoint).json(&body).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ModelError::Status(status.as_u16()));
            }
            Ok::<_, ModelError>(response.json::<CompletionResponse>().await?)
        };

        let completion = timeout(self.timeout, call)
            .await
            .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))??;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ModelError::EmptyResponse)
    }
}
