//! mlopt-agent - a streaming agent API for finding waste in Kubernetes ML workloads
//!
//! The agent answers questions about training and inference jobs by calling
//! tools on MCP servers (metrics, logs, cluster state, cost) and streams its
//! progress to the caller as `data: <JSON>` frames.

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod prompt;
pub mod server;
pub mod tools;

pub use error::{AgentError, Result};
