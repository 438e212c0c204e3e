//! Core LLM client trait, error type and a scripted mock client

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::llm::streaming::StreamChunk;
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// Stateless LLM client - each call is independent, history travels in the request
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Streaming completion; chunks are sent as they arrive and the
    /// assembled response is returned once the model stops
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError>;

    /// Model identifier used when the request does not name one
    fn model(&self) -> &str;
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("Event source error: {0}")]
    EventSource(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Stream consumer went away")]
    Cancelled,
}

/// Scripted client for tests: each call pops the next response
///
/// Text content is streamed as one chunk per whitespace-separated word and
/// tool calls as `ToolCall` + one `ToolInput` chunk.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<CompletionResponse, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn with_response(self, response: CompletionResponse) -> Self {
        self.lock_responses().push_back(Ok(response));
        self
    }

    /// Queue a failing call
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.lock_responses().push_back(Err(message.into()));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<CompletionResponse, String>>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        let next = self.lock_responses().pop_front();
        let response = match next {
            Some(Ok(response)) => response,
            Some(Err(message)) => return Err(LlmError::Stream(message)),
            None => return Err(LlmError::InvalidResponse("mock has no scripted response".to_string())),
        };

        let mut chunks: Vec<StreamChunk> = response
            .content
            .split_inclusive(' ')
            .map(|word| StreamChunk::Text(word.to_string()))
            .collect();
        for call in &response.tool_calls {
            chunks.push(StreamChunk::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
            });
            chunks.push(StreamChunk::ToolInput {
                id: call.id.clone(),
                input_delta: call.input.to_string(),
            });
        }
        chunks.push(StreamChunk::Done);

        for chunk in chunks {
            chunk_tx.send(chunk).await.map_err(|_| LlmError::Cancelled)?;
        }
        Ok(response)
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
