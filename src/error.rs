//! Error types for the optimization agent
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::llm::LlmError;

/// All error types that can occur while serving the agent
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Model API error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// MCP session or protocol error
    #[error("MCP error ({server}): {message}")]
    Mcp { server: String, message: String },

    /// Tool lookup or execution error
    #[error("Tool error: {0}")]
    Tool(String),

    /// HTTP server error
    #[error("Server error: {0}")]
    Server(String),

    /// Chat client could not talk to the relay
    #[error("Client error: {0}")]
    Client(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Build an MCP error tagged with the connector name
    pub fn mcp(server: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::Mcp {
            server: server.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
