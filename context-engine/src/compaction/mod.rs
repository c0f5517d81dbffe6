//! `CompressionPipeline`: keeps `ActiveContext` below budget while
//! preserving conversational continuity.
//!
//! Grounded on the teacher's `Session::compact()` / `CompactionConfig` /
//! `CompactionMetadata` (`llama-agent::types::sessions`), generalized from a
//! single compaction level into the three-level aging model, and on
//! `querymt`'s `DelegationSummarizer` for the provider-call-with-timeout and
//! skip-below-threshold pattern.

pub mod prompt;
pub mod selection;

use crate::active_context_store::ActiveContextStore;
use crate::events::{EngineEvent, EventBus};
use crate::provider::{summarize_bounded, ChatRequest, ProviderAdapter};
use crate::storage::SessionHistoryStore;
use crate::types::{
    CheckpointRecord, CheckpointSummary, CompressionConfig, CompressionError, CompressionLevel, EngineError, Session,
    SimpleTokenCounter, TokenCounter,
};
use prompt::SummarizationPrompt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Per-pass state, exposed for observability/testing; the pipeline itself
/// always returns to `Idle` whether a pass commits, finds nothing to do, or
/// errors (§4.3 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Selecting,
    Summarizing,
    Committing,
}

/// Outcome of one compression pass.
#[derive(Debug)]
pub enum PassOutcome {
    /// Nothing was eligible for compression.
    NoOp,
    /// A range was selected, summarized, and committed.
    Committed { checkpoint: CheckpointSummary },
    /// All eligible ranges are already at the terminal level.
    Exhausted,
}

pub struct CompressionPipeline {
    config: CompressionConfig,
    provider: Arc<dyn ProviderAdapter>,
    history: Arc<dyn SessionHistoryStore>,
    events: EventBus,
    prompt: SummarizationPrompt,
}

impl CompressionPipeline {
    pub fn new(
        config: CompressionConfig,
        provider: Arc<dyn ProviderAdapter>,
        history: Arc<dyn SessionHistoryStore>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            provider,
            history,
            events,
            prompt: SummarizationPrompt::default(),
        }
    }

    /// `available = window_tokens − tokens(system_prompt) − Σ tokens(checkpoint_summaries) − reserve`.
    /// Implementations must compare usage against this, never against
    /// `window_tokens` itself — doing so causes a "recompress immediately
    /// after compress" loop.
    pub fn available_budget(&self, window_tokens: usize, system_prompt_tokens: usize, checkpoint_tokens: usize) -> usize {
        window_tokens
            .saturating_sub(system_prompt_tokens)
            .saturating_sub(checkpoint_tokens)
            .saturating_sub(self.config.reserve_tokens)
    }

    pub fn should_trigger(&self, recent_tokens: usize, available: usize) -> bool {
        available > 0 && (recent_tokens as f64) >= self.config.trigger_ratio * (available as f64)
    }

    /// Runs one compression pass against `store`, per §4.3's
    /// select→summarize→commit state machine. On any failure the
    /// `ActiveContext` is left unchanged and the error is surfaced; no
    /// partial state is ever observable. `current_turn` is the caller's
    /// per-session turn count, stamped onto any new checkpoint so later
    /// aging can measure turns elapsed rather than wall-clock time.
    pub async fn run_pass(
        &self,
        session: &Session,
        store: &ActiveContextStore,
        current_turn: u64,
    ) -> Result<PassOutcome, EngineError> {
        // Selecting
        let ctx = store.clone_context().await;
        let Some(range_indices) = selection::select_eligible_range(&ctx.recent_messages, self.config.keep_recent) else {
            return Ok(PassOutcome::NoOp);
        };

        let range: Vec<_> = range_indices.iter().map(|&i| ctx.recent_messages[i].clone()).collect();
        let range_ids: Vec<_> = range.iter().map(|m| m.id).collect();
        let original_tokens: usize = range.iter().map(|m| m.token_count).sum();

        // Summarizing
        let conversation_history = render_range(&range);
        let max_summary_tokens = session.window_tokens / 2;
        let messages = self.prompt.bounded_messages(&conversation_history, max_summary_tokens);

        let request = ChatRequest {
            model_id: session.model_id.clone(),
            messages,
            max_tokens: Some(max_summary_tokens),
        };

        let summary_text = summarize_bounded(
            self.provider.as_ref(),
            request,
            CancellationToken::new(),
            self.config.summarization_timeout,
        )
        .await
        .map_err(|e| EngineError::Compression(CompressionError::Failed(e.to_string())))?;

        let counter = SimpleTokenCounter;
        let current_tokens = counter.count_text(&summary_text);

        // Committing
        let checkpoint = CheckpointSummary::new(range_ids.clone(), summary_text, original_tokens, current_tokens, current_turn);
        store.replace_range(&range_ids, checkpoint.clone()).await?;
        self.history
            .append_checkpoint_record(session, &CheckpointRecord::from(&checkpoint))
            .await?;

        info!(
            session_id = %session.session_id,
            checkpoint_id = %checkpoint.id,
            ratio = checkpoint.compression_ratio(),
            "compression pass committed"
        );
        self.events.publish(EngineEvent::CheckpointCreated {
            id: checkpoint.id,
            level: checkpoint.level,
            compression_ratio: checkpoint.compression_ratio(),
            range_len: range_ids.len(),
        });

        Ok(PassOutcome::Committed { checkpoint })
    }

    /// Ages existing checkpoints: a level-1 checkpoint older than `T1` turns
    /// (while pressure persists) is promoted to level 2, and a level-2
    /// checkpoint older than `T2` turns is promoted to level 3. A level-3
    /// checkpoint whose range is still too large is reported exhausted
    /// rather than silently left alone.
    pub async fn age_checkpoints(
        &self,
        session: &Session,
        store: &ActiveContextStore,
        turns_elapsed_for: impl Fn(&CheckpointSummary) -> u32,
        pressure_persists: bool,
    ) -> Result<usize, EngineError> {
        if !pressure_persists {
            return Ok(0);
        }

        let mut ctx = store.clone_context().await;
        let mut promoted = 0;
        let mut exhausted_any = false;

        for checkpoint in ctx.checkpoint_summaries.iter_mut() {
            let turns = turns_elapsed_for(checkpoint);
            let still_under_pressure = match checkpoint.level {
                CompressionLevel::L1 => turns >= self.config.t1_turns,
                CompressionLevel::L2 => turns >= self.config.t2_turns,
                // Already at the terminal level: there is nothing left to
                // promote to, so continued pressure here is exhaustion, not
                // a normal aging step.
                CompressionLevel::L3 => turns >= self.config.t2_turns,
            };
            if !still_under_pressure {
                continue;
            }
            if checkpoint.level.is_terminal() {
                exhausted_any = true;
                continue;
            }

            let next_level = checkpoint.level.promote().expect("checked not terminal above");
            let target_ratio = next_level.default_target_ratio();
            let new_tokens = ((checkpoint.original_tokens as f64) * target_ratio).round() as usize;
            let recompressed_text = format!("{} (recompressed)", checkpoint.summary_text);
            checkpoint
                .recompress(recompressed_text, new_tokens.max(1))
                .map_err(|e| EngineError::Session(crate::types::SessionError::InvalidState(e.to_string())))?;
            promoted += 1;

            self.events.publish(EngineEvent::CheckpointCreated {
                id: checkpoint.id,
                level: checkpoint.level,
                compression_ratio: checkpoint.compression_ratio(),
                range_len: checkpoint.original_message_ids.len(),
            });
        }

        store.install(ctx).await;

        if exhausted_any {
            warn!(session_id = %session.session_id, "compression exhausted: all eligible ranges at terminal level");
            return Err(EngineError::Compression(CompressionError::Exhausted));
        }

        Ok(promoted)
    }
}

fn render_range(messages: &[crate::types::Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
