//! HTTP client for a running relay

use std::time::Duration;

use futures::StreamExt;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use serde::Deserialize;
use url::Url;

use crate::error::{AgentError, Result};
use crate::server::{PromptRequest, RelayEvent};

pub const DEFAULT_AGENT_URL: &str = "http://localhost:8080";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

pub const STREAM_CUT_SHORT: &str = "Stream ended before the agent finished";

/// What `GET /health` reported
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub mcp_servers: Vec<String>,
}

/// How one prompt ended
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Concatenated text fragments
    pub text: String,
    /// Set when the relay sent an error frame or hung up before `done`
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
}

impl AgentClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| AgentError::Config(format!("Invalid agent URL {}: {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AgentError::Client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthReport> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| AgentError::Client(format!("Cannot connect to agent: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgentError::Client(format!("Agent is not responding ({})", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| AgentError::Client(format!("Bad health response: {}", e)))
    }

    /// Send a prompt and feed each frame to `on_frame` until `done` or `error`
    pub async fn send_prompt(&self, prompt: &str, mut on_frame: impl FnMut(&RelayEvent)) -> Result<TurnOutcome> {
        let builder = self
            .http
            .post(format!("{}/prompt", self.base_url))
            .timeout(PROMPT_TIMEOUT)
            .json(&PromptRequest {
                prompt: prompt.to_string(),
            });
        let mut source = EventSource::new(builder).map_err(|e| AgentError::Client(e.to_string()))?;

        let mut outcome = TurnOutcome::default();
        let mut finished = false;
        // EventSource retries on error, so close it on every way out
        while let Some(event) = source.next().await {
            let message = match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(EventSourceError::StreamEnded) => break,
                Err(EventSourceError::InvalidStatusCode(status, _)) => {
                    source.close();
                    return Err(AgentError::Client(format!("Agent returned {}", status)));
                }
                Err(e) => {
                    source.close();
                    return Err(AgentError::Client(format!("Failed to connect to agent: {}", e)));
                }
            };

            let Some(frame) = parse_frame(&message.data) else {
                log::debug!("Skipping undecodable frame: {}", message.data);
                continue;
            };
            on_frame(&frame);

            match frame {
                RelayEvent::Text { content } => outcome.text.push_str(&content),
                RelayEvent::Error { content } => {
                    outcome.error = Some(content);
                    finished = true;
                    break;
                }
                RelayEvent::Done => {
                    finished = true;
                    break;
                }
                RelayEvent::Tool { .. } | RelayEvent::Result { .. } => {}
            }
        }
        source.close();
        if !finished {
            outcome.error = Some(STREAM_CUT_SHORT.to_string());
        }
        Ok(outcome)
    }
}

/// Decode the JSON payload of one `data:` line
pub fn parse_frame(data: &str) -> Option<RelayEvent> {
    serde_json::from_str(data).ok()
}
