//! Interactive terminal chat against a running relay

use std::io::Write;
use std::path::PathBuf;

use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::client::AgentClient;
use crate::chat::transcript::{DEFAULT_EXPORT_FILE, Speaker, Transcript};
use crate::error::Result;
use crate::server::RelayEvent;

/// Canned prompts offered by `/examples`
pub const EXAMPLE_PROMPTS: [(&str, &str); 3] = [
    (
        "Analyze GPU Usage",
        "Show me GPU utilization metrics for all training jobs in the last hour",
    ),
    (
        "Cost Analysis",
        "What are the most expensive workloads running right now and can we optimize them?",
    ),
    ("Debug Job", "Why is my training job showing high 5XX errors?"),
];

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Prompt(String),
    Clear,
    Export(Option<PathBuf>),
    Examples,
    Quit,
    Unknown(String),
    Empty,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Prompt(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match name {
            "clear" => ReplCommand::Clear,
            "export" if arg.is_empty() => ReplCommand::Export(None),
            "export" => ReplCommand::Export(Some(PathBuf::from(arg))),
            "examples" => ReplCommand::Examples,
            "quit" | "exit" => ReplCommand::Quit,
            other => ReplCommand::Unknown(other.to_string()),
        }
    }
}

/// Run the chat loop until `/quit` or end of input
pub async fn run(client: &AgentClient) -> Result<()> {
    println!("{}", "🤖 AI/ML Optimization Agent".bold());
    println!("Ask questions about your AI/ML workloads and get optimization recommendations.");
    match client.health().await {
        Ok(health) => {
            println!("{} {}", "✅".green(), format!("Agent is healthy at {}", client.base_url()).green());
            if !health.mcp_servers.is_empty() {
                println!("MCP Servers: {}", health.mcp_servers.join(", "));
            }
        }
        Err(e) => println!("{} {}", "❌".red(), e.to_string().red()),
    }
    println!("{}", "Commands: /examples /export [path] /clear /quit".dimmed());

    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", "you>".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Clear => {
                transcript.clear();
                println!("{}", "Conversation cleared".dimmed());
            }
            ReplCommand::Examples => {
                for (i, (label, prompt)) in EXAMPLE_PROMPTS.iter().enumerate() {
                    println!("  {}. {}: {}", i + 1, label.bold(), prompt);
                }
            }
            ReplCommand::Export(path) => {
                if transcript.is_empty() {
                    println!("{}", "No conversation to export yet".dimmed());
                    continue;
                }
                let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
                match transcript.export(&path) {
                    Ok(()) => println!("Exported to {}", path.display().to_string().green()),
                    Err(e) => println!("{}", format!("Export failed: {}", e).red()),
                }
            }
            ReplCommand::Unknown(name) => println!("{}", format!("Unknown command: /{}", name).yellow()),
            ReplCommand::Prompt(prompt) => {
                transcript.push(Speaker::User, prompt.clone());
                let reply = ask(client, &prompt).await;
                transcript.push(Speaker::Assistant, reply);
            }
        }
    }
    Ok(())
}

/// Stream one answer to the terminal and return what goes in the transcript
async fn ask(client: &AgentClient, prompt: &str) -> String {
    let outcome = client
        .send_prompt(prompt, |frame| match frame {
            RelayEvent::Text { content } => {
                print!("{}", content);
                let _ = std::io::stdout().flush();
            }
            RelayEvent::Tool { name, .. } => {
                if let Some(name) = name.as_str() {
                    println!("{}", format!("  ⚙ {}", name).dimmed());
                }
            }
            _ => {}
        })
        .await;
    println!();

    match outcome {
        Ok(outcome) => {
            if let Some(error) = outcome.error {
                println!("{}", format!("Error: {}", error).red());
            }
            outcome.text
        }
        Err(e) => {
            println!("{}", e.to_string().red());
            format!("Error: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        assert_eq!(
            ReplCommand::parse("  why is my job slow? "),
            ReplCommand::Prompt("why is my job slow?".to_string())
        );
        assert_eq!(ReplCommand::parse("   "), ReplCommand::Empty);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ReplCommand::parse("/clear"), ReplCommand::Clear);
        assert_eq!(ReplCommand::parse("/examples"), ReplCommand::Examples);
        assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/bogus"), ReplCommand::Unknown("bogus".to_string()));
    }

    #[test]
    fn test_parse_export() {
        assert_eq!(ReplCommand::parse("/export"), ReplCommand::Export(None));
        assert_eq!(
            ReplCommand::parse("/export  out/chat.md "),
            ReplCommand::Export(Some(PathBuf::from("out/chat.md")))
        );
    }

    #[test]
    fn test_examples_match_original_prompts() {
        assert_eq!(EXAMPLE_PROMPTS.len(), 3);
        assert!(EXAMPLE_PROMPTS[2].1.contains("5XX"));
    }
}
