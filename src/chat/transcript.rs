//! Local record of a chat session, exportable as Markdown

use std::path::Path;

use crate::error::Result;

pub const DEFAULT_EXPORT_FILE: &str = "ai_ml_agent_conversation.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    fn heading(self) -> &'static str {
        match self {
            Speaker::User => "🧑 User",
            Speaker::Assistant => "🤖 Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub speaker: Speaker,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, speaker: Speaker, content: impl Into<String>) {
        self.entries.push(Entry {
            speaker,
            content: content.into(),
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_markdown(&self) -> String {
        let mut markdown = String::from("# AI/ML Optimization Agent - Conversation\n\n");
        for entry in &self.entries {
            markdown.push_str(&format!("## {}\n{}\n\n---\n\n", entry.speaker.heading(), entry.content));
        }
        markdown
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_markdown())?;
        Ok(())
    }
}
