//! Conversation history: a per-session, append-only log of messages, and
//! the manager that multiplexes many such sessions by `conversationId`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::message::Message;

/// An ordered, append-only log of messages for one conversation.
///
/// Appends are the only mutation besides `clear()`; `get_messages()` always
/// returns a snapshot in insertion order. When `max_size` is set, the
/// snapshot is bounded to the most recent `max_size` messages — older
/// messages are not deleted from the append log's conceptual history, but
/// are no longer handed to provider calls.
pub struct ConversationSession {
    id: String,
    messages: Vec<Message>,
    created_at: u64,
    max_size: Option<usize>,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, max_size: Option<usize>) -> Self {
        ConversationSession {
            id: id.into(),
            messages: Vec::new(),
            created_at: now_millis(),
            max_size,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// A snapshot of the session's messages, bounded by `max_size` if set.
    pub fn get_messages(&self) -> Vec<Message> {
        match self.max_size {
            Some(max) if self.messages.len() > max => {
                self.messages[self.messages.len() - max..].to_vec()
            }
            _ => self.messages.clone(),
        }
    }

    /// The full, unbounded message log, regardless of `max_size`.
    pub fn get_all_messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn get_message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Breakdown of a session's messages by role, used in the agent's stats
/// snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub system_messages: usize,
    pub tool_messages: usize,
}

impl HistoryStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut stats = HistoryStats::default();
        for message in messages {
            match message {
                Message::User { .. } => stats.user_messages += 1,
                Message::Assistant { .. } => stats.assistant_messages += 1,
                Message::System { .. } => stats.system_messages += 1,
                Message::Tool { .. } => stats.tool_messages += 1,
            }
        }
        stats
    }
}

/// Owns every [`ConversationSession`] for one agent, keyed by
/// `conversationId`. Sessions are independent: there is no shared mutable
/// state across sessions, and no manager is shared across agents.
pub struct HistoryManager {
    sessions: HashMap<String, ConversationSession>,
    default_max_size: Option<usize>,
}

impl HistoryManager {
    pub fn new(default_max_size: Option<usize>) -> Self {
        HistoryManager {
            sessions: HashMap::new(),
            default_max_size,
        }
    }

    /// Get the session for `conversation_id`, creating it (empty) on first reference.
    pub fn session_mut(&mut self, conversation_id: &str) -> &mut ConversationSession {
        self.sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationSession::new(conversation_id, self.default_max_size))
    }

    pub fn session(&self, conversation_id: &str) -> Option<&ConversationSession> {
        self.sessions.get(conversation_id)
    }

    pub fn clear(&mut self, conversation_id: &str) {
        if let Some(session) = self.sessions.get_mut(conversation_id) {
            session.clear();
        }
    }

    pub fn remove(&mut self, conversation_id: &str) {
        self.sessions.remove(conversation_id);
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(None)
    }
}
