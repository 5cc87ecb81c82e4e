//! OpenAI-compatible chat completion client
//!
//! One explicitly constructed handle serves both external roles:
//! [`ProfileSummarizer`] and [`ClassificationOracle`]. The client only moves
//! text; reply validation belongs to the calling stage.
//!
//! ## Rate limiting and retries
//! Requests are spaced by `min_interval_ms`. Transport failures, 429 and
//! 5xx replies are retried up to `max_retries` times with jittered
//! exponential backoff. Everything else fails immediately.

use crate::error::OracleError;
use crate::services::prompts::{
    classification_prompt, summary_prompt, CLASSIFICATION_SYSTEM_MESSAGE,
};
use crate::types::{ClassificationOracle, Profile, ProfileSummarizer};
use famsort_common::config::OracleConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("famsort/", env!("CARGO_PKG_VERSION"));
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_JITTER_MS: u64 = 250;

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Minimum spacing between consecutive requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Oracle rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Delay before retry number `attempt` (1-based)
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(6));
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(exp + jitter)
}

/// OpenAI-compatible API client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    completions_url: String,
    api_key: String,
    summary_model: String,
    classification_model: String,
    summary_temperature: f32,
    classification_temperature: f32,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(config: &OracleConfig, api_key: String) -> Result<Self, OracleError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(config.min_interval_ms)),
            completions_url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            api_key,
            summary_model: config.summary_model.clone(),
            classification_model: config.classification_model.clone(),
            summary_temperature: config.summary_temperature,
            classification_temperature: config.classification_temperature,
            max_retries: config.max_retries,
        })
    }

    /// Send a chat completion, retrying transient failures
    ///
    /// Returns the first choice's trimmed content.
    pub async fn chat_completion(
        &self,
        model: &str,
        temperature: f32,
        messages: &[ChatMessage],
    ) -> Result<String, OracleError> {
        let mut attempt = 0;
        loop {
            match self.send_once(model, temperature, messages).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        model = %model,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Oracle call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        model: &str,
        temperature: f32,
        messages: &[ChatMessage],
    ) -> Result<String, OracleError> {
        self.rate_limiter.wait().await;

        let request = ChatCompletionRequest {
            model,
            messages,
            temperature,
        };

        tracing::debug!(model = %model, messages = messages.len(), "Calling oracle");

        let response = self
            .http_client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();

        if status == 401 {
            return Err(OracleError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}

#[async_trait::async_trait]
impl ProfileSummarizer for OpenAiClient {
    async fn summarize(&self, fields: &[(String, String)]) -> Result<String, OracleError> {
        let messages = [ChatMessage::user(summary_prompt(fields))];
        self.chat_completion(&self.summary_model, self.summary_temperature, &messages)
            .await
    }
}

#[async_trait::async_trait]
impl ClassificationOracle for OpenAiClient {
    async fn classify(
        &self,
        instruction: &str,
        participants: &[Profile],
    ) -> Result<String, OracleError> {
        let messages = [
            ChatMessage::system(CLASSIFICATION_SYSTEM_MESSAGE),
            ChatMessage::user(classification_prompt(instruction, participants)),
        ];
        self.chat_completion(
            &self.classification_model,
            self.classification_temperature,
            &messages,
        )
        .await
    }
}
