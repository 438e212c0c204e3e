use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use mlopt_agent::agent::{Agent, AgentSettings};
use mlopt_agent::chat::{self, AgentClient};
use mlopt_agent::config::Config;
use mlopt_agent::llm::{AnthropicClient, LlmClient};
use mlopt_agent::mcp::{build_connectors, parse_registry};
use mlopt_agent::prompt::system_prompt;
use mlopt_agent::server::{self, AppContext};
use mlopt_agent::tools::McpToolRouter;

mod cli;

use cli::Cli;
use cli::commands::Commands;

/// Where log lines go: the server logs to stderr, interactive commands to a file
enum LogTarget {
    Stderr,
    File,
}

fn setup_logging(target: LogTarget, default_level: &str) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    match target {
        LogTarget::Stderr => {
            builder.target(env_logger::Target::Stderr).init();
        }
        LogTarget::File => {
            let log_dir = dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(env!("CARGO_PKG_NAME"))
                .join("logs");

            fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

            let log_file = log_dir.join(format!("{}.log", env!("CARGO_PKG_NAME")));
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .context("Failed to open log file")?;

            builder.target(env_logger::Target::Pipe(Box::new(file))).init();
            info!("Logging initialized, writing to: {}", log_file.display());
        }
    }
    Ok(())
}

async fn run_serve(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let registry = parse_registry(config.mcp.servers.as_deref());
    let server_names = registry.names();
    let connectors = build_connectors(&registry, config.mcp.session_settings());
    let tools = Arc::new(McpToolRouter::new(connectors));

    let llm = Arc::new(AnthropicClient::new(config.model.anthropic()).context("Failed to create model client")?);

    let mut settings = AgentSettings::new(llm.model(), system_prompt(&server_names));
    settings.window_size = config.agent.window_size;
    settings.max_turns = config.agent.max_turns;
    settings.max_tokens = Some(config.model.max_tokens);
    info!(
        "Agent initialized with model={}, {} MCP server(s)",
        llm.model(),
        server_names.len()
    );
    let agent = Agent::new(llm, tools, settings);

    let mut listen = config.server.clone();
    if let Some(host) = host {
        listen.host = host;
    }
    if let Some(port) = port {
        listen.port = port;
    }
    let addr = listen.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind {}", addr))?;

    let ctx = Arc::new(AppContext::new(Arc::new(agent), server_names));
    server::serve(listener, ctx, server::shutdown_signal())
        .await
        .context("Server failed")?;
    Ok(())
}

async fn run_health(config: &Config, url: Option<String>) -> Result<()> {
    let url = url.unwrap_or_else(|| config.chat.agent_url.clone());
    let client = AgentClient::new(&url)?;

    match client.health().await {
        Ok(health) => {
            println!("{} Agent is {} at {}", "✅".green(), health.status.green(), client.base_url());
            if let Some(model) = health.model {
                println!("  model:       {}", model);
            }
            if health.mcp_servers.is_empty() {
                println!("  MCP servers: {}", "none".dimmed());
            } else {
                println!("  MCP servers: {}", health.mcp_servers.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "❌".red(), e.to_string().red());
            Err(e).context("Health check failed")
        }
    }
}

async fn run_chat(config: &Config, url: Option<String>) -> Result<()> {
    let url = url.unwrap_or_else(|| config.chat.agent_url.clone());
    let client = AgentClient::new(&url)?;
    chat::run(&client).await.context("Chat session failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let command = cli.command_or_default();

    // Load configuration before logging so log_level can apply
    let loaded = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let config = loaded.config;

    let level = if cli.is_verbose() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    let target = match command {
        Commands::Serve { .. } => LogTarget::Stderr,
        Commands::Health { .. } | Commands::Chat { .. } => LogTarget::File,
    };
    setup_logging(target, &level).context("Failed to setup logging")?;
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }

    info!("Starting with config from: {:?}", cli.config);

    match command {
        Commands::Serve { host, port } => run_serve(&config, host, port).await,
        Commands::Health { url } => run_health(&config, url).await,
        Commands::Chat { url } => run_chat(&config, url).await,
    }
}
