use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::DEFAULT_WINDOW_SIZE;
use crate::chat::DEFAULT_AGENT_URL;
use crate::llm::AnthropicConfig;
use crate::llm::anthropic::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::mcp::{MCP_SERVERS_ENV, SessionSettings};

pub const MODEL_ID_ENV: &str = "MODEL_ID";
pub const AGENT_URL_ENV: &str = "AGENT_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub model: ModelConfig,
    pub mcp: McpConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_id: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: 8192,
            timeout_ms: 300000,
        }
    }
}

impl ModelConfig {
    pub fn anthropic(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.model_id.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
            base_url: self.base_url.clone(),
            api_key_env: self.api_key_env.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Same `name=url,...` form as the MCP_SERVERS variable
    pub servers: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers: None,
            connect_timeout_ms: 30000,
            request_timeout_ms: 60000,
        }
    }
}

impl McpConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub window_size: usize,
    pub max_turns: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_turns: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context(format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub agent_url: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            agent_url: DEFAULT_AGENT_URL.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            model: ModelConfig::default(),
            mcp: McpConfig::default(),
            agent: AgentConfig::default(),
            server: ServerConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// A loaded config plus the problems met on the way
///
/// Config is read before logging is set up, so skipped files are reported
/// here for the caller to log.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    pub warnings: Vec<String>,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Loaded> {
        let mut loaded = Self::load_file(config_path)?;
        loaded.config.apply_env(|key| std::env::var(key).ok());
        Ok(loaded)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Loaded> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            let config = Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()))?;
            return Ok(Loaded {
                config,
                warnings: Vec::new(),
            });
        }

        // Primary location: ~/.config/<project>/<project>.yml, then ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let mut candidates = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(project_name).join(format!("{}.yml", project_name)));
        }
        candidates.push(PathBuf::from(format!("{}.yml", project_name)));
        Ok(Self::load_first(&candidates))
    }

    /// First candidate that exists and parses wins; broken ones become warnings
    fn load_first(candidates: &[PathBuf]) -> Loaded {
        let mut warnings = Vec::new();
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return Loaded { config, warnings },
                Err(e) => warnings.push(format!("Failed to load config from {}: {:#}", path.display(), e)),
            }
        }

        log::info!("No config file found, using defaults");
        Loaded {
            config: Self::default(),
            warnings,
        }
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Environment variables win over file values
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model_id) = lookup(MODEL_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.model.model_id = model_id;
        }
        if let Some(servers) = lookup(MCP_SERVERS_ENV) {
            self.mcp.servers = Some(servers);
        }
        if let Some(agent_url) = lookup(AGENT_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.chat.agent_url = agent_url;
        }
    }
}
