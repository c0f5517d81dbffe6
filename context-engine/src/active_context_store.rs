//! `ActiveContextStore`: holds the exact messages sent to the LLM on the
//! next turn, and enforces the token ceiling (invariant 2).

use crate::types::{ActiveContext, CheckpointSummary, EngineError, Message, ReadOnlyView, SessionError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Single-writer, multi-reader store for one session's `ActiveContext`.
/// Readers obtain an owned `ReadOnlyView` so writers never block readers of
/// a prior view (§4.2 concurrency note).
pub struct ActiveContextStore {
    inner: Arc<RwLock<ActiveContext>>,
}

impl ActiveContextStore {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ActiveContext::new(system_prompt))),
        }
    }

    /// Adds a message to `recent_messages`. Fails with `WindowExceeded`
    /// only if the single message alone exceeds `window_tokens`; the
    /// orchestrator, not this store, is responsible for triggering
    /// compression when the aggregate grows too large.
    pub async fn append(&self, message: Message, window_tokens: usize) -> Result<(), EngineError> {
        if message.token_count > window_tokens {
            return Err(EngineError::WindowExceeded {
                tokens: message.token_count,
                window_tokens,
            });
        }
        let mut ctx = self.inner.write().await;
        debug!(message_id = %message.id, tokens = message.token_count, "appending message to active context");
        ctx.recent_messages.push(message);
        Ok(())
    }

    /// Atomically removes `message_ids` from `recent_messages` and inserts
    /// `summary` at the ordered position among existing checkpoints,
    /// enforcing invariants 1 (storage separation — the removed messages
    /// still live in `SessionHistory`, untouched by this call), 3
    /// (contiguous, ordered checkpoints) and 5 (monotonic level, upheld by
    /// the caller constructing `summary`).
    pub async fn replace_range(
        &self,
        message_ids: &[crate::types::MessageId],
        summary: CheckpointSummary,
    ) -> Result<(), EngineError> {
        let mut ctx = self.inner.write().await;

        let to_remove: std::collections::HashSet<_> = message_ids.iter().collect();
        let removed_count_before = ctx.recent_messages.len();
        ctx.recent_messages.retain(|m| !to_remove.contains(&m.id));
        if ctx.recent_messages.len() + message_ids.len() != removed_count_before {
            return Err(EngineError::Session(SessionError::InvalidState(
                "replace_range referenced message ids not present in active context".into(),
            )));
        }

        let insert_at = ctx
            .checkpoint_summaries
            .iter()
            .position(|existing| existing.range_start() > summary.range_start())
            .unwrap_or(ctx.checkpoint_summaries.len());
        ctx.checkpoint_summaries.insert(insert_at, summary);
        Ok(())
    }

    pub async fn snapshot_view(&self) -> ReadOnlyView {
        let ctx = self.inner.read().await;
        ReadOnlyView::from(&*ctx)
    }

    /// Drops all messages and summaries. Does not touch history or
    /// snapshots (invariant 1).
    pub async fn clear(&self) {
        let mut ctx = self.inner.write().await;
        ctx.recent_messages.clear();
        ctx.checkpoint_summaries.clear();
    }

    pub async fn set_system_prompt(&self, system_prompt: impl Into<String>) {
        let mut ctx = self.inner.write().await;
        ctx.system_prompt = system_prompt.into();
    }

    /// Replaces the whole context, used by `SnapshotCoordinator::restore`.
    pub async fn install(&self, context: ActiveContext) {
        let mut ctx = self.inner.write().await;
        *ctx = context;
    }

    pub async fn clone_context(&self) -> ActiveContext {
        self.inner.read().await.clone()
    }
}
