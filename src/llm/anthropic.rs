//! Anthropic API client implementation
//!
//! This module implements the LlmClient trait for the Anthropic Messages API
//! using server-sent-event streaming.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::streaming::{StreamChunk, StreamParser, parse_sse_event};
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// Anthropic API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model to use
///
/// This is a Bedrock inference-profile id. api.anthropic.com does not accept
/// it, so either point `base_url` at an endpoint that serves it or set
/// `MODEL_ID` to an Anthropic model name.
pub const DEFAULT_MODEL: &str = "us.anthropic.claude-opus-4-5-20251101-v1:0";

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Default credential variable
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Configuration for the Anthropic client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub base_url: String,
    pub api_key_env: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(300),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl AnthropicConfig {
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// Anthropic API client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    ///
    /// Reads the API key from the environment variable named in the config
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: AnthropicConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, api_key, config })
    }

    /// Build the request body for the Anthropic API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model).clone();
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": request.messages,
            "stream": true
        });

        if !request.system.is_empty() {
            body["system"] = json!(request.system);
        }

        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }

        body
    }

    /// Map a non-2xx reply into an error
    async fn status_error(response: reqwest::Response) -> LlmError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            };
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        LlmError::ApiError { status, message }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        let builder = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let mut source = EventSource::new(builder).map_err(|e| LlmError::EventSource(e.to_string()))?;
        let mut parser = StreamParser::new();

        // EventSource reconnects on its own after any error, so every exit
        // path below has to close it
        while let Some(event) = source.next().await {
            let message = match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(EventSourceError::StreamEnded) => break,
                Err(EventSourceError::InvalidStatusCode(_, response)) => {
                    source.close();
                    return Err(Self::status_error(response).await);
                }
                Err(e) => {
                    source.close();
                    return Err(LlmError::EventSource(e.to_string()));
                }
            };

            let Some(stream_event) = parse_sse_event(&message.data) else {
                log::debug!("Skipping unrecognised stream event: {}", message.event);
                continue;
            };

            for chunk in parser.process_event(stream_event) {
                if let StreamChunk::Error(message) = &chunk {
                    source.close();
                    return Err(LlmError::Stream(message.clone()));
                }
                if chunk_tx.send(chunk).await.is_err() {
                    source.close();
                    return Err(LlmError::Cancelled);
                }
            }

            if parser.is_finished() {
                break;
            }
        }
        source.close();

        if !parser.is_finished() {
            return Err(LlmError::InvalidResponse(
                "stream ended before message_stop".to_string(),
            ));
        }
        parser.finish()
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
