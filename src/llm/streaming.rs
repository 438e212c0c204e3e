//! Streaming support for LLM responses.
//!
//! Provides the typed Messages API stream events, the chunks emitted to
//! consumers while a response is in flight, and a parser that accumulates
//! the events into a final [`CompletionResponse`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::llm::client::LlmError;
use crate::llm::types::{CompletionResponse, StopReason, ToolCall, Usage};

/// Events received during streaming from the Anthropic API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: u32,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<DeltaUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiErrorBody,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageStart {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageDeltaBody {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeltaUsage {
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub message: String,
}

/// Chunk types emitted to consumers during streaming.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text content delta
    Text(String),
    /// Tool call started
    ToolCall { id: String, name: String },
    /// Tool input JSON delta
    ToolInput { id: String, input_delta: String },
    /// Stream completed successfully
    Done,
    /// Stream error
    Error(String),
}

/// Parse the data payload of one SSE event into a StreamEvent.
///
/// Unknown event types yield `None` so new API events do not break parsing.
pub fn parse_sse_event(data: &str) -> Option<StreamEvent> {
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    serde_json::from_str(data).ok()
}

#[derive(Debug)]
enum BlockState {
    Text(String),
    ToolUse { id: String, name: String, json: String },
    Ignored,
}

/// State tracker for parsing streaming responses.
#[derive(Debug, Default)]
pub struct StreamParser {
    blocks: BTreeMap<u32, BlockState>,
    stop_reason: Option<StopReason>,
    usage: Usage,
    finished: bool,
}

impl StreamParser {
    /// Create a new stream parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `message_stop` has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Process a stream event and emit chunks.
    pub fn process_event(&mut self, event: StreamEvent) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();

        match event {
            StreamEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.usage.input_tokens = usage.input_tokens;
                }
            }
            StreamEvent::ContentBlockStart { index, content_block } => {
                let state = match content_block {
                    BlockStart::Text { text } => {
                        if !text.is_empty() {
                            chunks.push(StreamChunk::Text(text.clone()));
                        }
                        BlockState::Text(text)
                    }
                    BlockStart::ToolUse { id, name } => {
                        chunks.push(StreamChunk::ToolCall {
                            id: id.clone(),
                            name: name.clone(),
                        });
                        BlockState::ToolUse {
                            id,
                            name,
                            json: String::new(),
                        }
                    }
                    BlockStart::Other => BlockState::Ignored,
                };
                self.blocks.insert(index, state);
            }
            StreamEvent::ContentBlockDelta { index, delta } => match (self.blocks.get_mut(&index), delta) {
                (Some(BlockState::Text(text)), BlockDelta::TextDelta { text: delta }) => {
                    text.push_str(&delta);
                    chunks.push(StreamChunk::Text(delta));
                }
                (Some(BlockState::ToolUse { id, json, .. }), BlockDelta::InputJsonDelta { partial_json }) => {
                    json.push_str(&partial_json);
                    chunks.push(StreamChunk::ToolInput {
                        id: id.clone(),
                        input_delta: partial_json,
                    });
                }
                _ => {}
            },
            StreamEvent::ContentBlockStop { .. } | StreamEvent::Ping => {}
            StreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.stop_reason = Some(StopReason::from_api(&reason));
                }
                if let Some(usage) = usage {
                    self.usage.output_tokens = usage.output_tokens;
                }
            }
            StreamEvent::MessageStop => {
                self.finished = true;
                chunks.push(StreamChunk::Done);
            }
            StreamEvent::Error { error } => {
                chunks.push(StreamChunk::Error(error.message));
            }
        }

        chunks
    }

    /// Assemble the final response from the accumulated blocks
    pub fn finish(self) -> Result<CompletionResponse, LlmError> {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for state in self.blocks.into_values() {
            match state {
                BlockState::Text(text) => text_parts.push(text),
                BlockState::ToolUse { id, name, json } => {
                    let input = if json.trim().is_empty() {
                        Value::Object(Default::default())
                    } else {
                        serde_json::from_str(&json)
                            .map_err(|e| LlmError::InvalidResponse(format!("tool {} input is not JSON: {}", name, e)))?
                    };
                    tool_calls.push(ToolCall::new(id, name, input));
                }
                BlockState::Ignored => {}
            }
        }

        let stop_reason = self.stop_reason.unwrap_or(if tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        });

        Ok(CompletionResponse {
            content: text_parts.join(""),
            tool_calls,
            stop_reason,
            usage: self.usage,
        })
    }
}
