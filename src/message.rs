//! Core type definitions for conversation messages and tool calls.
//!
//! A [`Message`] is a tagged union discriminated by role, matching the four
//! roles a conversation can contain: `user`, `system`, `assistant`, and
//! `tool`. Unlike a vendor SDK's wire format, this is the crate's own
//! in-memory shape — `Provider` adapters are responsible for translating it
//! to and from whatever their backend expects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Arbitrary caller-attached metadata carried alongside a message.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Milliseconds since the Unix epoch, used for `Message::timestamp`.
///
/// A plain integer rather than a date/time library type: the crate has no
/// need to do calendar arithmetic, only to record and compare instants.
pub type TimestampMillis = u64;

/// Returns the current time in milliseconds since the Unix epoch.
pub fn now_millis() -> TimestampMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as TimestampMillis
}

/// A single function-call request emitted by an assistant message.
///
/// `arguments_json` is opaque, caller-produced JSON text; it is parsed
/// defensively against the tool's schema during `S3 Execute Tools`, never
/// evaluated or trusted ahead of validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    /// Always `"function"` today; kept as a field (not implied) so new call
    /// kinds can be added without breaking serialized history.
    pub kind: String,
    pub function: ToolCallFunction,
}

/// The function-name/arguments pair inside a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments_json: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments_json: impl Into<String>) -> Self {
        ToolCall {
            id: id.into(),
            kind: "function".to_string(),
            function: ToolCallFunction {
                name: name.into(),
                arguments_json: arguments_json.into(),
            },
        }
    }
}

/// A single message in a conversation, discriminated by `role`.
///
/// The `tool` invariant is enforced by the execution loop, not by this
/// type: a `Tool` message's `tool_call_id` must reference a
/// `ToolCall::id` emitted by the immediately-preceding `Assistant` message in
/// the same session, and every `ToolCall` must be answered before the next
/// assistant turn is requested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
        timestamp: TimestampMillis,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    System {
        content: String,
        timestamp: TimestampMillis,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    Assistant {
        /// `None` is only valid when `tool_calls` is non-empty.
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
        timestamp: TimestampMillis,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    Tool {
        content: String,
        tool_call_id: String,
        timestamp: TimestampMillis,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            timestamp: now_millis(),
            metadata: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
            timestamp: now_millis(),
            metadata: None,
        }
    }

    /// A final assistant answer with no pending tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: None,
            timestamp: now_millis(),
            metadata: None,
        }
    }

    /// An assistant turn that requests tool execution. `content` may be
    /// `None`; per spec this is only valid when `tool_calls` is non-empty,
    /// which this constructor enforces by taking a non-empty `Vec`.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        debug_assert!(
            content.is_some() || !tool_calls.is_empty(),
            "assistant content may only be None when tool_calls is non-empty"
        );
        Message::Assistant {
            content,
            tool_calls: Some(tool_calls),
            timestamp: now_millis(),
            metadata: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            timestamp: now_millis(),
            metadata: None,
        }
    }

    /// Attach metadata to a message, consuming and returning it (builder style).
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        match &mut self {
            Message::User { metadata: m, .. }
            | Message::System { metadata: m, .. }
            | Message::Assistant { metadata: m, .. }
            | Message::Tool { metadata: m, .. } => *m = Some(metadata),
        }
        self
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::System { .. } => "system",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    pub fn timestamp(&self) -> TimestampMillis {
        match self {
            Message::User { timestamp, .. }
            | Message::System { timestamp, .. }
            | Message::Assistant { timestamp, .. }
            | Message::Tool { timestamp, .. } => *timestamp,
        }
    }

    /// The tool calls requested by this message, if any (empty for non-assistant
    /// messages and for assistant messages with no pending calls).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant {
                tool_calls: Some(calls),
                ..
            } => calls,
            _ => &[],
        }
    }
}
