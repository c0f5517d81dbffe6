//! Summarization prompt template, grounded on the teacher's
//! `CompactionPrompt` (`llama-agent::types::sessions`).

use crate::types::{Message, MessageRole, SimpleTokenCounter, TokenCounter};
use serde::{Deserialize, Serialize};

/// Prompt template used to ask the provider to summarize a message range.
/// Per §4.3, the rendered prompt specifies the overall user goal (if
/// known), what has already been accomplished, and what must be
/// continuable — callers fill those sections into `conversation_history`
/// before rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationPrompt {
    pub system_instructions: String,
    pub user_template: String,
}

impl Default for SummarizationPrompt {
    fn default() -> Self {
        Self {
            system_instructions: "You are an AI assistant specialized in creating conversation \
                summaries. Preserve the user's original goal, what has already been \
                accomplished, and an explicit next-step handoff so the conversation can \
                continue without restarting."
                .to_string(),
            user_template: "Summarize the following conversation range. State: (1) the \
                original request, (2) what has been completed so far, (3) the next step.\n\n\
                {conversation_history}"
                .to_string(),
        }
    }
}

impl SummarizationPrompt {
    pub fn render_user_prompt(&self, conversation_history: &str) -> String {
        self.user_template.replace("{conversation_history}", conversation_history)
    }

    pub fn create_messages(&self, conversation_history: &str) -> Vec<Message> {
        let counter = SimpleTokenCounter;
        vec![
            Message::new(MessageRole::System, self.system_instructions.clone(), &counter),
            Message::new(MessageRole::User, self.render_user_prompt(conversation_history), &counter),
        ]
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.system_instructions.trim().len() < 10 {
            return Err("system_instructions must be at least 10 characters");
        }
        if !self.user_template.contains("{conversation_history}") {
            return Err("user_template must contain the {conversation_history} placeholder");
        }
        Ok(())
    }

    /// Bounds the rendered prompt to `max_tokens`, per the requirement that
    /// summarization itself never exceed `window_tokens / 2`. Truncates the
    /// conversation history from the front (oldest content first) rather
    /// than failing outright.
    pub fn bounded_messages(&self, conversation_history: &str, max_tokens: usize) -> Vec<Message> {
        let counter = SimpleTokenCounter;
        let mut history = conversation_history.to_string();
        loop {
            let messages = self.create_messages(&history);
            let total: usize = messages.iter().map(|m| counter.count_message(m)).sum();
            if total <= max_tokens || history.len() < 200 {
                return messages;
            }
            let cut = history.len() / 10;
            history = history[cut..].to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_validates() {
        assert!(SummarizationPrompt::default().validate().is_ok());
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let prompt = SummarizationPrompt {
            system_instructions: "a reasonably long system instruction".into(),
            user_template: "no placeholder here".into(),
        };
        assert!(prompt.validate().is_err());
    }

    #[test]
    fn bounded_messages_shrinks_oversized_history() {
        let prompt = SummarizationPrompt::default();
        let long_history = "word ".repeat(5000);
        let messages = prompt.bounded_messages(&long_history, 100);
        let counter = SimpleTokenCounter;
        let total: usize = messages.iter().map(|m| counter.count_message(m)).sum();
        assert!(total <= 200, "expected roughly bounded total, got {total}");
    }
}
