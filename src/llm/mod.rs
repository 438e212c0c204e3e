//! LLM Client Layer - Anthropic API integration with streaming
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - AnthropicClient implementation
//! - Streaming event parsing

pub mod anthropic;
pub mod client;
pub mod streaming;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmError, MockLlmClient};
pub use streaming::{StreamChunk, StreamEvent, StreamParser, parse_sse_event};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, Role, StopReason, ToolCall, ToolDefinition,
    ToolResult, Usage,
};
