//! Agent events to push-stream frames
//!
//! `classify` decides which agent events reach the caller; `relay` wraps a
//! whole invocation so it always ends with exactly one `done` or `error`.

use async_stream::stream;
use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{AgentEvent, AgentStream};

/// One frame sent to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayEvent {
    Text { content: String },
    Tool { name: Value, input: Value },
    Result { content: String },
    Done,
    Error { content: String },
}

impl RelayEvent {
    /// Wire form: `data: <JSON>\n\n`
    pub fn to_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }

    pub fn to_json(&self) -> String {
        // a tagged enum of strings and values always serializes
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error","content":"unserializable frame"}"#.to_string())
    }

    pub fn to_sse(&self) -> Event {
        Event::default().data(self.to_json())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayEvent::Done | RelayEvent::Error { .. })
    }
}

/// Map one agent event to the frame the caller sees, if any
pub fn classify(event: &AgentEvent) -> Option<RelayEvent> {
    match event {
        AgentEvent::TextDelta(content) => Some(RelayEvent::Text {
            content: content.clone(),
        }),
        AgentEvent::ToolUse { current_tool_use } => Some(RelayEvent::Tool {
            name: current_tool_use.get("name").cloned().unwrap_or(Value::Null),
            input: current_tool_use.get("input").cloned().unwrap_or(Value::Null),
        }),
        AgentEvent::Result(result) => Some(RelayEvent::Result {
            content: result.to_string(),
        }),
        AgentEvent::TurnStart { .. } | AgentEvent::ToolResult { .. } | AgentEvent::MessageStop { .. } => None,
    }
}

/// Forward an invocation's events, ending with `Done` or a single `Error`
pub fn relay(mut events: AgentStream) -> impl Stream<Item = RelayEvent> + Send + 'static {
    stream! {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    if let Some(frame) = classify(&event) {
                        yield frame;
                    }
                }
                Err(e) => {
                    log::error!("Agent stream failed: {}", e);
                    yield RelayEvent::Error { content: e.to_string() };
                    return;
                }
            }
        }
        yield RelayEvent::Done;
    }
}
