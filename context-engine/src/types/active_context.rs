//! The exact message list that will be serialized into the next LLM request.

use crate::types::checkpoint::CheckpointSummary;
use crate::types::messages::Message;
use serde::{Deserialize, Serialize};

/// The live, mutable context for a session. Bytes sent to the LLM come only
/// from here (storage-separation invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveContext {
    pub system_prompt: String,
    /// Ordered oldest-first, contiguous and non-overlapping ranges.
    pub checkpoint_summaries: Vec<CheckpointSummary>,
    pub recent_messages: Vec<Message>,
}

impl ActiveContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            checkpoint_summaries: Vec::new(),
            recent_messages: Vec::new(),
        }
    }

    pub fn checkpoint_tokens(&self) -> usize {
        self.checkpoint_summaries.iter().map(|c| c.current_tokens).sum()
    }

    pub fn recent_tokens(&self) -> usize {
        self.recent_messages.iter().map(|m| m.token_count).sum()
    }

    pub fn system_prompt_tokens(&self, counter: &dyn crate::types::messages::TokenCounter) -> usize {
        counter.count_text(&self.system_prompt)
    }
}

/// A cheap, borrowable snapshot of `ActiveContext` used by the
/// `PromptAssembler`. Readers never block writers of the next turn; each
/// view is an independent clone of the owned data at the moment it was
/// taken.
#[derive(Debug, Clone)]
pub struct ReadOnlyView {
    pub system_prompt: String,
    pub checkpoint_summaries: Vec<CheckpointSummary>,
    pub recent_messages: Vec<Message>,
}

impl From<&ActiveContext> for ReadOnlyView {
    fn from(ctx: &ActiveContext) -> Self {
        Self {
            system_prompt: ctx.system_prompt.clone(),
            checkpoint_summaries: ctx.checkpoint_summaries.clone(),
            recent_messages: ctx.recent_messages.clone(),
        }
    }
}
