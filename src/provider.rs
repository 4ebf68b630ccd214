//! Provider capability: the backend-agnostic contract every LLM vendor
//! adapter implements, plus the per-agent registry that tracks which
//! providers are registered and which one is currently selected.
//!
//! No concrete vendor transport ships in this crate — integrators implement [`Provider`]
//! over their own HTTP/gRPC/SDK client. Tests and demos in this crate use an
//! in-memory [`ScriptedProvider`] fake.

use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;

use futures::Stream;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::schema::ToolSchema;

/// Options accepted by a single `chat`/`chat_stream` call.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub tools: Vec<ToolSchema>,
    pub tool_choice: ToolChoice,
}

/// Which tools (if any) the provider should consider for this call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Named(String),
}

/// A single streamed chunk of an in-progress assistant turn.
///
/// Chunks may carry partial text, a partial tool-call fragment (identified
/// by `id` so fragments can be reassembled), or signal that the provider's
/// turn is complete. The execution loop reassembles fragments by `id`
/// before classifying the turn.
#[derive(Debug, Clone)]
pub enum ChatStreamChunk {
    ContentDelta(String),
    ToolCallDelta {
        id: String,
        name_delta: Option<String>,
        arguments_delta: Option<String>,
    },
    Done,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamChunk>> + Send>>;

/// The abstract contract every LLM backend adapter implements.
///
/// The core treats providers as black boxes producing [`Message::Assistant`]
/// values; implementers own their vendor transport entirely.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider's registered name (must be unique within a `ProviderRegistry`).
    fn name(&self) -> &str;

    /// Send the full message history and receive one assistant response.
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<Message>;

    /// Stream an assistant response chunk by chunk. Default: unsupported.
    async fn chat_stream(&self, _messages: &[Message], _options: &ChatOptions) -> Result<ChatStream> {
        Err(Error::provider(self.name(), "streaming not supported by this provider"))
    }

    /// Whether this provider can be given tool schemas at all.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Validate that this provider is usable (credentials present, model
    /// known, etc). Default: always valid.
    fn validate_config(&self) -> bool {
        true
    }

    /// Release any resources held by this provider (connections, handles).
    async fn dispose(&self) {}
}

/// Reassemble a sequence of streamed chunks into one final assistant
/// [`Message`], grouping tool-call fragments by `id` in first-seen order.
///
/// This is the shared reassembly logic the execution loop's streaming mode
/// runs before `S2 Classify`.
pub fn reassemble_stream(chunks: &[ChatStreamChunk]) -> Message {
    let mut content = String::new();
    let mut has_content = false;
    let mut order: Vec<String> = Vec::new();
    let mut names: HashMap<String, String> = HashMap::new();
    let mut arguments: HashMap<String, String> = HashMap::new();

    for chunk in chunks {
        match chunk {
            ChatStreamChunk::ContentDelta(delta) => {
                content.push_str(delta);
                has_content = true;
            }
            ChatStreamChunk::ToolCallDelta {
                id,
                name_delta,
                arguments_delta,
            } => {
                if !order.contains(id) {
                    order.push(id.clone());
                }
                if let Some(n) = name_delta {
                    names.entry(id.clone()).or_default().push_str(n);
                }
                if let Some(a) = arguments_delta {
                    arguments.entry(id.clone()).or_default().push_str(a);
                }
            }
            ChatStreamChunk::Done => {}
        }
    }

    if order.is_empty() {
        return Message::assistant(content);
    }

    let calls = order
        .into_iter()
        .map(|id| {
            let name = names.remove(&id).unwrap_or_default();
            let args = arguments.remove(&id).unwrap_or_default();
            crate::message::ToolCall::new(id, name, args)
        })
        .collect();

    let final_content = if has_content { Some(content) } else { None };
    Message::assistant_tool_calls(final_content, calls)
}

/// Per-agent registry of providers by unique name, plus the currently
/// selected provider/model pair.
pub struct ProviderRegistry {
    providers: HashMap<String, std::sync::Arc<dyn Provider>>,
    current: Option<(String, String)>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: HashMap::new(),
            current: None,
        }
    }

    /// Register a provider. Fails if the name is already registered
    /// (provider names must be unique, spec §3 `AgentConfig` invariant).
    pub fn register(&mut self, provider: std::sync::Arc<dyn Provider>) -> Result<()> {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(Error::configuration(format!("duplicate provider name '{}'", name)));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<std::sync::Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Select the active provider/model pair. Fails if `name` is not registered.
    pub fn set_current_provider(&mut self, name: &str, model: impl Into<String>) -> Result<()> {
        if !self.providers.contains_key(name) {
            return Err(Error::configuration(format!(
                "cannot select unregistered provider '{}'",
                name
            )));
        }
        self.current = Some((name.to_string(), model.into()));
        Ok(())
    }

    pub fn current_provider_name(&self) -> Option<&str> {
        self.current.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn current_model(&self) -> Option<&str> {
        self.current.as_ref().map(|(_, model)| model.as_str())
    }

    pub fn current(&self) -> Option<std::sync::Arc<dyn Provider>> {
        self.current
            .as_ref()
            .and_then(|(name, _)| self.providers.get(name))
            .cloned()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_scripted_provider_plays_back_in_order() {
        let provider = ScriptedProvider::new(
            "fake",
            vec![Message::assistant("first"), Message::assistant("second")],
        );
        let first = provider.chat(&[], &ChatOptions::default()).await.unwrap();
        let second = provider.chat(&[], &ChatOptions::default()).await.unwrap();
        match (first, second) {
            (Message::Assistant { content: c1, .. }, Message::Assistant { content: c2, .. }) => {
                assert_eq!(c1.unwrap(), "first");
                assert_eq!(c2.unwrap(), "second");
            }
            _ => panic!("expected assistant messages"),
        }
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(ScriptedProvider::new("p1", vec![])))
            .unwrap();
        let result = registry.register(Arc::new(ScriptedProvider::new("p1", vec![])));
        assert!(result.is_err());
    }

    #[test]
    fn test_set_current_provider_requires_registration() {
        let mut registry = ProviderRegistry::new();
        let result = registry.set_current_provider("missing", "model-x");
        assert!(result.is_err());
    }

    #[test]
    fn test_set_current_provider_succeeds_when_registered() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(ScriptedProvider::new("p1", vec![])))
            .unwrap();
        registry.set_current_provider("p1", "model-x").unwrap();
        assert_eq!(registry.current_provider_name(), Some("p1"));
        assert_eq!(registry.current_model(), Some("model-x"));
        assert!(registry.current().is_some());
    }

    #[test]
    fn test_reassemble_stream_handles_text_only() {
        let chunks = vec![
            ChatStreamChunk::ContentDelta("Hel".to_string()),
            ChatStreamChunk::ContentDelta("lo".to_string()),
            ChatStreamChunk::Done,
        ];
        let msg = reassemble_stream(&chunks);
        match msg {
            Message::Assistant { content, tool_calls, .. } => {
                assert_eq!(content.unwrap(), "Hello");
                assert!(tool_calls.is_none());
            }
            _ => panic!("expected assistant"),
        }
    }

    #[test]
    fn test_reassemble_stream_groups_tool_call_fragments_by_id() {
        let chunks = vec![
            ChatStreamChunk::ToolCallDelta {
                id: "t1".to_string(),
                name_delta: Some("ad".to_string()),
                arguments_delta: Some("{\"a\":".to_string()),
            },
            ChatStreamChunk::ToolCallDelta {
                id: "t1".to_string(),
                name_delta: Some("d".to_string()),
                arguments_delta: Some("1}".to_string()),
            },
            ChatStreamChunk::Done,
        ];
        let msg = reassemble_stream(&chunks);
        match msg {
            Message::Assistant { tool_calls: Some(calls), content, .. } => {
                assert!(content.is_none());
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].function.name, "add");
                assert_eq!(calls[0].function.arguments_json, "{\"a\":1}");
            }
            _ => panic!("expected assistant with tool calls"),
        }
    }
}
