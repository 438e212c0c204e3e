//! The agent loop: model call, tool calls, repeat
//!
//! One invocation streams [`AgentEvent`]s while it runs. History from earlier
//! invocations is read at the start and the new messages are committed to the
//! sliding window only when the invocation completes.

use std::collections::HashMap;
use std::sync::Arc;

use async_stream::try_stream;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};

use crate::agent::conversation::{Conversation, DEFAULT_WINDOW_SIZE};
use crate::agent::event::{AgentEvent, AgentResult};
use crate::error::{AgentError, Result};
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, StopReason, StreamChunk, Usage};
use crate::tools::ToolRouter;

/// Stream of events for one invocation; an `Err` item ends it
pub type AgentStream = BoxStream<'static, Result<AgentEvent>>;

/// Buffered chunks between the model call and the event stream
const CHUNK_BUFFER: usize = 64;

/// Tunables for the agent loop
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model_id: String,
    pub system_prompt: String,
    pub window_size: usize,
    /// Upper bound on model calls per invocation
    pub max_turns: u32,
    pub max_tokens: Option<u32>,
}

impl AgentSettings {
    pub fn new(model_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            system_prompt: system_prompt.into(),
            window_size: DEFAULT_WINDOW_SIZE,
            max_turns: 20,
            max_tokens: None,
        }
    }
}

/// Something that turns a prompt into a stream of agent events
pub trait AgentRuntime: Send + Sync {
    fn stream_async(&self, prompt: String) -> AgentStream;

    fn model_id(&self) -> &str;

    /// Release connector sessions; best effort
    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

struct AgentInner {
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolRouter>,
    settings: AgentSettings,
    conversation: Mutex<Conversation>,
}

/// Process-wide agent: one model, one tool set, one conversation window
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<dyn ToolRouter>, settings: AgentSettings) -> Self {
        let conversation = Conversation::new(settings.window_size);
        Self {
            inner: Arc::new(AgentInner {
                llm,
                tools,
                settings,
                conversation: Mutex::new(conversation),
            }),
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.inner.settings
    }

    /// Snapshot of the committed history
    pub async fn history(&self) -> Vec<Message> {
        self.inner.conversation.lock().await.messages().to_vec()
    }
}

impl AgentRuntime for Agent {
    fn stream_async(&self, prompt: String) -> AgentStream {
        Box::pin(run(self.inner.clone(), prompt))
    }

    fn model_id(&self) -> &str {
        &self.inner.settings.model_id
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.inner.tools.shutdown().await })
    }
}

fn run(inner: Arc<AgentInner>, prompt: String) -> impl futures::Stream<Item = Result<AgentEvent>> + Send + 'static {
    try_stream! {
        let tools = inner.tools.definitions().await?;
        let history = inner.conversation.lock().await.messages().to_vec();

        let mut new_messages = vec![Message::user(prompt)];
        let mut usage = Usage::default();
        let mut turn = 0;

        let (stop_reason, final_text) = loop {
            turn += 1;
            yield AgentEvent::TurnStart { turn };

            let mut messages = history.clone();
            messages.extend(new_messages.iter().cloned());
            let mut request = CompletionRequest::new(inner.settings.system_prompt.clone())
                .with_messages(messages)
                .with_tools(tools.clone());
            request.model = Some(inner.settings.model_id.clone());
            request.max_tokens = inner.settings.max_tokens;

            let (chunk_tx, mut chunk_rx) = mpsc::channel(CHUNK_BUFFER);
            let llm = inner.llm.clone();
            let call = tokio::spawn(async move { llm.stream(request, chunk_tx).await });

            let mut tool_inputs = ToolInputs::default();
            while let Some(chunk) = chunk_rx.recv().await {
                if let Some(event) = tool_inputs.apply(chunk) {
                    yield event;
                }
            }

            let response = call
                .await
                .map_err(|e| AgentError::Llm(LlmError::Stream(format!("model task failed: {}", e))))??;
            usage.add(&response.usage);
            yield AgentEvent::MessageStop { stop_reason: response.stop_reason };

            if !response.stop_reason.needs_continuation() || response.tool_calls.is_empty() {
                let reply = Message::from_response(&response);
                if !reply.content.is_empty() {
                    new_messages.push(reply);
                }
                break (response.stop_reason, response.content);
            }
            // a tool_use without its results would poison the next request
            if turn >= inner.settings.max_turns {
                log::warn!("Stopping after {} model calls", turn);
                break (StopReason::MaxTokens, response.content);
            }
            new_messages.push(Message::from_response(&response));

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for tool_call in &response.tool_calls {
                let result = inner.tools.execute(tool_call).await?;
                yield AgentEvent::ToolResult {
                    tool_use_id: tool_call.id.clone(),
                    name: tool_call.name.clone(),
                    is_error: result.is_error,
                };
                results.push(result);
            }
            new_messages.push(Message::tool_results(&results));
        };

        inner.conversation.lock().await.commit(new_messages);

        yield AgentEvent::Result(AgentResult {
            stop_reason,
            message: final_text,
            usage,
            turns: turn,
        });
    }
}

/// Accumulates streamed tool input so each delta can report the whole
/// input received so far
#[derive(Default)]
struct ToolInputs {
    active: HashMap<String, (String, String)>,
}

impl ToolInputs {
    fn apply(&mut self, chunk: StreamChunk) -> Option<AgentEvent> {
        match chunk {
            StreamChunk::Text(text) => Some(AgentEvent::TextDelta(text)),
            StreamChunk::ToolCall { id, name } => {
                let event = current_tool_use(&id, &name, "");
                self.active.insert(id, (name, String::new()));
                Some(event)
            }
            StreamChunk::ToolInput { id, input_delta } => {
                let (name, input) = self.active.get_mut(&id)?;
                input.push_str(&input_delta);
                Some(current_tool_use(&id, name, input))
            }
            StreamChunk::Done | StreamChunk::Error(_) => None,
        }
    }
}

fn current_tool_use(id: &str, name: &str, input: &str) -> AgentEvent {
    AgentEvent::ToolUse {
        current_tool_use: json!({
            "toolUseId": id,
            "name": name,
            "input": Value::String(input.to_string()),
        }),
    }
}
