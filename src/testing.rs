//! In-memory test doubles for the boundary traits (`Provider`, `Tool`).
//!
//! Exercising the execution loop, plugin pipeline, and history manager does
//! not require a real network call or a real vendor SDK — these fakes let
//! this crate's own tests (and integrators' tests) drive the core end to
//! end against a scripted, deterministic backend.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::{ChatOptions, Provider};

/// A fake [`Provider`] that plays back a fixed sequence of assistant
/// responses, one per `chat` call, in order. Panics (via `Error::Provider`)
/// if asked for more responses than were scripted.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<Vec<Message>>,
    call_count: std::sync::atomic::AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>, script: Vec<Message>) -> Self {
        ScriptedProvider {
            name: name.into(),
            script: Mutex::new(script),
            call_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of times `chat` has been called so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<Message> {
        self.call_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut script = self.script.lock().await;
        if script.is_empty() {
            return Err(Error::provider(&self.name, "script exhausted"));
        }
        Ok(script.remove(0))
    }
}

/// A [`Provider`] that always returns the same tool call, useful for
/// exercising `maxToolTurns` exhaustion.
pub struct RepeatingToolCallProvider {
    name: String,
    tool_name: String,
    arguments_json: String,
    call_count: std::sync::atomic::AtomicUsize,
}

impl RepeatingToolCallProvider {
    pub fn new(name: impl Into<String>, tool_name: impl Into<String>, arguments_json: impl Into<String>) -> Self {
        RepeatingToolCallProvider {
            name: name.into(),
            tool_name: tool_name.into(),
            arguments_json: arguments_json.into(),
            call_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for RepeatingToolCallProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<Message> {
        let n = self.call_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let call = crate::message::ToolCall::new(
            format!("call-{}", n),
            self.tool_name.clone(),
            self.arguments_json.clone(),
        );
        Ok(Message::assistant_tool_calls(None, vec![call]))
    }
}
