//! CLI command definitions using clap.
//!
//! Subcommands:
//! - serve: run the streaming relay (default)
//! - health: query a running relay
//! - chat: interactive terminal chat

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mlopt-agent - find waste in Kubernetes ML workloads
#[derive(Parser, Debug)]
#[command(name = "mlopt-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// The subcommand, `serve` with file/env settings when none was given
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve { host: None, port: None })
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the agent API server
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check a running agent
    Health {
        /// Agent base URL (defaults to AGENT_URL or config)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Chat with a running agent
    Chat {
        /// Agent base URL (defaults to AGENT_URL or config)
        #[arg(short, long)]
        url: Option<String>,
    },
}
