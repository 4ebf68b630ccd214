//! Context window management utilities: token estimation and history
//! truncation.
//!
//! Whether to trim history by token budget or by message count is left to
//! adapters; this module supplies the utility an adapter reaches for
//! rather than building trimming into the history manager itself.

use crate::message::Message;

/// Characters-per-token used by the estimate below. A rough constant
/// (~70-85% accurate across model families) — good enough for proactive
/// truncation decisions, not for billing.
const CHARS_PER_TOKEN: f64 = 4.0;

fn message_text_len(message: &Message) -> usize {
    match message {
        Message::User { content, .. } | Message::System { content, .. } | Message::Tool { content, .. } => {
            content.len()
        }
        Message::Assistant { content, tool_calls, .. } => {
            let text_len = content.as_deref().map(str::len).unwrap_or(0);
            let calls_len: usize = tool_calls
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .map(|c| c.function.name.len() + c.function.arguments_json.len())
                .sum();
            text_len + calls_len
        }
    }
}

/// Estimate the number of tokens in a message history using a
/// character-based approximation.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let total_chars: usize = messages.iter().map(message_text_len).sum();
    ((total_chars as f64) / CHARS_PER_TOKEN).ceil() as usize
}

/// Whether a history's estimated token count exceeds `limit`.
pub fn is_approaching_limit(messages: &[Message], limit: usize) -> bool {
    estimate_tokens(messages) > limit
}

/// Truncate a message history to keep only the most recent `keep_turns`
/// messages, optionally preserving a leading `system` message regardless
/// of the turn count.
pub fn truncate_messages(messages: &[Message], keep_turns: usize, preserve_system: bool) -> Vec<Message> {
    if messages.len() <= keep_turns {
        return messages.to_vec();
    }

    let system_prefix: Option<&Message> = if preserve_system {
        messages.first().filter(|m| matches!(m, Message::System { .. }))
    } else {
        None
    };

    let tail_start = messages.len() - keep_turns;
    let mut result = Vec::with_capacity(keep_turns + 1);
    if let Some(system) = system_prefix {
        if tail_start > 0 {
            result.push(system.clone());
        }
    }
    result.extend_from_slice(&messages[tail_start..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_scales_with_content_length() {
        let short = vec![Message::user("hi")];
        let long = vec![Message::user("hi ".repeat(100))];
        assert!(estimate_tokens(&long) > estimate_tokens(&short));
    }

    #[test]
    fn test_is_approaching_limit_reports_true_past_threshold() {
        let messages = vec![Message::user("x".repeat(1000))];
        assert!(is_approaching_limit(&messages, 10));
        assert!(!is_approaching_limit(&messages, 10_000));
    }

    #[test]
    fn test_truncate_keeps_only_recent_turns() {
        let messages: Vec<Message> = (0..10).map(|i| Message::user(format!("msg {}", i))).collect();
        let truncated = truncate_messages(&messages, 3, false);
        assert_eq!(truncated.len(), 3);
        match &truncated[2] {
            Message::User { content, .. } => assert_eq!(content, "msg 9"),
            _ => panic!("expected user message"),
        }
    }

    #[test]
    fn test_truncate_preserves_leading_system_message() {
        let mut messages = vec![Message::system("be nice")];
        messages.extend((0..10).map(|i| Message::user(format!("msg {}", i))));
        let truncated = truncate_messages(&messages, 3, true);
        assert_eq!(truncated.len(), 4);
        assert_eq!(truncated[0].role(), "system");
    }

    #[test]
    fn test_truncate_is_noop_when_under_limit() {
        let messages = vec![Message::user("a"), Message::user("b")];
        let truncated = truncate_messages(&messages, 10, false);
        assert_eq!(truncated.len(), 2);
    }

    #[test]
    fn test_tool_call_arguments_count_toward_assistant_message_length() {
        let call = crate::message::ToolCall::new("t1", "add", r#"{"a":1,"b":2}"#);
        let msg = Message::assistant_tool_calls(None, vec![call]);
        assert!(estimate_tokens(&[msg]) > 0);
    }
}
