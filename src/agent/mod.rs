//! Agent runtime: model loop, tool calls and conversation memory

mod conversation;
mod event;
mod runtime;

pub use conversation::{Conversation, DEFAULT_WINDOW_SIZE};
pub use event::{AgentEvent, AgentResult};
pub use runtime::{Agent, AgentRuntime, AgentSettings, AgentStream};
