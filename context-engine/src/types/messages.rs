//! Message types for a single conversational turn.

use crate::types::ids::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A tool invocation attached to an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// A single turn in a conversation.
///
/// `tool_calls` and `tool_result_ref` exist so the compression pipeline can
/// recognize a tool-call/tool-result pair and never split it across a
/// checkpoint boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub token_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result_ref: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>, counter: &dyn TokenCounter) -> Self {
        let content = content.into();
        let token_count = counter.count_text(&content) + counter.role_overhead(role);
        Self {
            id: MessageId::new(),
            role,
            content,
            token_count,
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
            tool_result_ref: None,
        }
    }

    /// A message is part of a tool-call/tool-result pair if it either
    /// carries tool calls (assistant side) or references one (tool side).
    pub fn is_tool_linked(&self) -> bool {
        !self.tool_calls.is_empty() || self.tool_result_ref.is_some()
    }
}

/// Trait for estimating token counts; the real token count a provider would
/// compute is provider-specific and out of scope, so the engine ships a
/// heuristic estimator and accepts a caller-supplied one for precise
/// accounting.
pub trait TokenCounter: Send + Sync {
    fn count_text(&self, text: &str) -> usize;

    fn role_overhead(&self, role: MessageRole) -> usize {
        match role {
            MessageRole::System => 4,
            MessageRole::User => 4,
            MessageRole::Assistant => 4,
            MessageRole::Tool => 6,
        }
    }

    fn count_message(&self, message: &Message) -> usize {
        self.count_text(&message.content) + self.role_overhead(message.role)
    }
}

/// Word-based heuristic counter, grounded on the teacher's `SimpleTokenCounter`.
#[derive(Debug, Clone, Default)]
pub struct SimpleTokenCounter;

impl TokenCounter for SimpleTokenCounter {
    fn count_text(&self, text: &str) -> usize {
        ((text.split_whitespace().count() as f64) * 1.3).ceil() as usize
    }
}

/// Character-based heuristic counter (roughly 4 characters per token),
/// grounded on the `mofa` `CharBasedEstimator` pattern — useful for
/// providers whose tokenizer skews closer to byte-pair encoding than
/// word-splitting.
#[derive(Debug, Clone)]
pub struct CharBasedTokenCounter {
    pub chars_per_token: f64,
}

impl Default for CharBasedTokenCounter {
    fn default() -> Self {
        Self { chars_per_token: 4.0 }
    }
}

impl TokenCounter for CharBasedTokenCounter {
    fn count_text(&self, text: &str) -> usize {
        ((text.chars().count() as f64) / self.chars_per_token).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_counter_scales_with_word_count() {
        let counter = SimpleTokenCounter;
        assert!(counter.count_text("one two three") > counter.count_text("one"));
    }

    #[test]
    fn tool_call_marks_message_as_linked() {
        let counter = SimpleTokenCounter;
        let mut msg = Message::new(MessageRole::Assistant, "calling a tool", &counter);
        assert!(!msg.is_tool_linked());
        msg.tool_calls.push(ToolCall {
            id: "1".into(),
            name: "search".into(),
            arguments: "{}".into(),
        });
        assert!(msg.is_tool_linked());
    }
}
