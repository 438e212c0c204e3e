//! Terminal chat client for the relay service

pub mod client;
pub mod repl;
pub mod transcript;

pub use client::{AgentClient, DEFAULT_AGENT_URL, HealthReport, TurnOutcome, parse_frame};
pub use repl::{EXAMPLE_PROMPTS, ReplCommand, run};
pub use transcript::{DEFAULT_EXPORT_FILE, Speaker, Transcript};
