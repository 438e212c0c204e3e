//! Events emitted while the agent works on one prompt

use std::fmt;

use serde_json::Value;

use crate::llm::{StopReason, Usage};

/// One step of agent progress
///
/// The relay forwards a subset of these; the rest exist for logging and for
/// consumers that want the full picture.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A model call is starting
    TurnStart { turn: u32 },
    /// Model text fragment
    TextDelta(String),
    /// Tool use as streamed so far: `{"toolUseId", "name", "input"}` where
    /// `input` is the raw JSON text received up to this point
    ToolUse { current_tool_use: Value },
    /// A tool finished
    ToolResult {
        tool_use_id: String,
        name: String,
        is_error: bool,
    },
    /// A model call finished
    MessageStop { stop_reason: StopReason },
    /// The invocation is complete
    Result(AgentResult),
}

/// Final outcome of one invocation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentResult {
    pub stop_reason: StopReason,
    /// Text of the last assistant message
    pub message: String,
    pub usage: Usage,
    pub turns: u32,
}

impl fmt::Display for AgentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
