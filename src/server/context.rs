//! Shared state for request handlers
//!
//! Built once at startup and handed to every handler through axum `State`.

use std::sync::Arc;

use serde::Serialize;

use crate::agent::AgentRuntime;

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub model: String,
    pub mcp_servers: Vec<String>,
}

/// Process-wide context: the agent and what it was configured with
pub struct AppContext {
    pub agent: Arc<dyn AgentRuntime>,
    pub model_id: String,
    /// Connector names in registry order
    pub mcp_servers: Vec<String>,
}

impl AppContext {
    pub fn new(agent: Arc<dyn AgentRuntime>, mcp_servers: Vec<String>) -> Self {
        let model_id = agent.model_id().to_string();
        Self {
            agent,
            model_id,
            mcp_servers,
        }
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            model: self.model_id.clone(),
            mcp_servers: self.mcp_servers.clone(),
        }
    }

    /// Close connector sessions before the process exits
    pub async fn shutdown(&self) {
        log::info!("Closing {} MCP connector(s)", self.mcp_servers.len());
        self.agent.shutdown().await;
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("model_id", &self.model_id)
            .field("mcp_servers", &self.mcp_servers)
            .finish_non_exhaustive()
    }
}
