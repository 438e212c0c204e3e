//! Sliding-window conversation history shared across prompts

use crate::llm::{Message, Role};

/// Default number of messages kept between prompts
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// The last `window_size` messages of the conversation
///
/// After trimming, history always starts with a plain user message, never
/// with an assistant reply or a tool result whose tool_use was cut off.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    window_size: usize,
}

impl Conversation {
    pub fn new(window_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            window_size: window_size.max(1),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Append the messages of one finished invocation and trim the window
    pub fn commit(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.apply_window();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn apply_window(&mut self) {
        if self.messages.len() > self.window_size {
            let excess = self.messages.len() - self.window_size;
            self.messages.drain(..excess);
        }

        let start = self
            .messages
            .iter()
            .position(|m| m.role == Role::User && !m.is_tool_result())
            .unwrap_or(self.messages.len());
        self.messages.drain(..start);
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
