//! `ContextOrchestrator`: the top-level coordinator. Owns no state of its
//! own beyond per-session component handles; every invariant in §3 is
//! enforced by routing all mutation through here.
//!
//! Grounded on the teacher's top-level `Agent`/`AgentServer`
//! (`llama-agent::agent`), which is likewise the single place that wires
//! session storage, the generation backend, and the tool-call loop
//! together behind one public API.

use crate::active_context_store::ActiveContextStore;
use crate::compaction::CompressionPipeline;
use crate::events::EventBus;
use crate::mode_machine::ModeStateMachine;
use crate::prompt_assembler::{PromptAssembler, TurnContext};
use crate::provider::ProviderAdapter;
use crate::session_manager::SessionManager;
use crate::sizing::{ModelProfile, SizingController};
use crate::snapshot::SnapshotCoordinator;
use crate::storage::SessionHistoryStore;
use crate::types::{
    EngineConfig, EngineError, Message, MessageRole, Mode, ModeState, PromptError, Session, SessionId, SimpleTokenCounter,
    SnapshotId, SnapshotPurpose, TransitionCause,
};
use crate::vram_monitor::VRAMMonitor;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Commands the engine publishes for a CLI (or any other front end) to
/// dispatch; parsing flags and reporting exit codes is out of scope here.
pub enum EngineCommand {
    Clear { session_id: SessionId },
    New { model_id: String, profile: ModelProfile, pending_window: Option<usize> },
    Snapshot { session_id: SessionId, tag: Option<String> },
    Restore { session_id: SessionId, target: RestoreTarget },
    Mode { session_id: SessionId, mode: Mode },
    Compact { session_id: SessionId },
}

pub enum RestoreTarget {
    Id(SnapshotId),
    Latest,
}

struct SessionComponents {
    context: Arc<ActiveContextStore>,
    mode: Arc<ModeStateMachine>,
    /// Per-session conversational turn count, incremented once per
    /// `append_message` call; checkpoint aging is measured against this,
    /// never wall-clock time (§4.3).
    turns: Arc<AtomicU64>,
}

pub struct ContextOrchestrator {
    session_manager: Arc<SessionManager>,
    history: Arc<dyn SessionHistoryStore>,
    events: EventBus,
    sizing: SizingController,
    vram: VRAMMonitor,
    vram_task: JoinHandle<()>,
    vram_cancel: CancellationToken,
    compression: CompressionPipeline,
    snapshots: Arc<SnapshotCoordinator>,
    prompt_assembler: PromptAssembler,
    config: EngineConfig,
    sessions: RwLock<HashMap<SessionId, SessionComponents>>,
}

impl ContextOrchestrator {
    pub fn new(storage_root: PathBuf, provider: Arc<dyn ProviderAdapter>, config: EngineConfig) -> Self {
        let events = EventBus::default();
        let history: Arc<dyn SessionHistoryStore> = Arc::new(crate::storage::FileSessionHistoryStore::new());
        let snapshots = Arc::new(SnapshotCoordinator::new(events.clone(), config.snapshot.retention.clone()));
        let compression = CompressionPipeline::new(config.compression.clone(), provider.clone(), history.clone(), events.clone());
        let sizing = SizingController::new(config.sizing.clone());
        let vram = VRAMMonitor::new(provider, config.sizing.clone(), events.clone());
        let vram_cancel = CancellationToken::new();
        let vram_task = vram.spawn(vram_cancel.clone());

        Self {
            session_manager: Arc::new(SessionManager::new(storage_root)),
            history,
            events,
            sizing,
            vram,
            vram_task,
            vram_cancel,
            compression,
            snapshots,
            prompt_assembler: PromptAssembler::new(),
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Starts a new session: computes the safe window once via
    /// `SizingController` (using the latest VRAM sample), creates the
    /// session, and wires its `ActiveContextStore`/`ModeStateMachine`.
    pub async fn new_session(
        &self,
        model_id: impl Into<String>,
        profile: ModelProfile,
        pending_window: Option<usize>,
    ) -> Result<Arc<Session>, EngineError> {
        let (window_tokens, _tier, warning) = self.sizing.compute_window(profile, self.vram.latest(), pending_window);
        if let Some(warning) = warning {
            warn!(%warning, "session window clamped at creation");
        }

        let session = self.session_manager.new_session(model_id, window_tokens).await?;
        self.snapshots.recover_startup(&session).await?;

        let mode_state = self.history.load_mode_state(&session).await?.unwrap_or_default();
        let components = SessionComponents {
            context: Arc::new(ActiveContextStore::new("")),
            mode: Arc::new(ModeStateMachine::new(mode_state, self.history.clone(), self.snapshots.clone(), self.events.clone())),
            turns: Arc::new(AtomicU64::new(0)),
        };
        self.sessions.write().await.insert(session.session_id, components);

        Ok(session)
    }

    /// Ends whichever session is current and starts a fresh, isolated one on
    /// `new_model_id`. The prior session's on-disk history and snapshots are
    /// left untouched; only its entry in `SessionManager`'s "current"
    /// pointer and this orchestrator's in-memory component map are dropped.
    pub async fn switch_model(
        &self,
        new_model_id: impl Into<String>,
        profile: ModelProfile,
        pending_window: Option<usize>,
    ) -> Result<Arc<Session>, EngineError> {
        let (window_tokens, _tier, warning) = self.sizing.compute_window(profile, self.vram.latest(), pending_window);
        if let Some(warning) = warning {
            warn!(%warning, "session window clamped on model switch");
        }

        let session = self.session_manager.switch_model(new_model_id, window_tokens).await?;
        self.snapshots.recover_startup(&session).await?;

        let mode_state = self.history.load_mode_state(&session).await?.unwrap_or_default();
        let components = SessionComponents {
            context: Arc::new(ActiveContextStore::new("")),
            mode: Arc::new(ModeStateMachine::new(mode_state, self.history.clone(), self.snapshots.clone(), self.events.clone())),
            turns: Arc::new(AtomicU64::new(0)),
        };
        self.sessions.write().await.insert(session.session_id, components);

        Ok(session)
    }

    /// Looks up a previously created session by id (not just the
    /// session-manager's "current" pointer) — used by the CLI surface to
    /// target commands at a specific session.
    pub async fn session(&self, session_id: SessionId) -> Result<Arc<Session>, EngineError> {
        self.session_manager.get(session_id).await
    }

    pub async fn active_context(&self, session_id: SessionId) -> Result<crate::types::ReadOnlyView, EngineError> {
        let (context, _) = self.components(session_id).await?;
        Ok(context.snapshot_view().await)
    }

    pub async fn current_mode(&self, session_id: SessionId) -> Result<Mode, EngineError> {
        let (_, mode_machine) = self.components(session_id).await?;
        Ok(mode_machine.current().await)
    }

    pub async fn list_snapshots(
        &self,
        session_id: SessionId,
        purpose: Option<SnapshotPurpose>,
    ) -> Result<Vec<crate::types::SnapshotDescriptor>, EngineError> {
        let session = self.session_manager.get(session_id).await?;
        self.snapshots.list(&session, purpose).await
    }

    pub async fn deliver_low_memory_probe(&self, free_bytes: u64, total_bytes: u64) {
        self.events.publish(crate::events::EngineEvent::LowMemory { free_bytes, total_bytes });
    }

    async fn components(&self, session_id: SessionId) -> Result<(Arc<ActiveContextStore>, Arc<ModeStateMachine>), EngineError> {
        let sessions = self.sessions.read().await;
        let components = sessions
            .get(&session_id)
            .ok_or_else(|| EngineError::Session(crate::types::SessionError::NotFound(session_id.to_string())))?;
        Ok((components.context.clone(), components.mode.clone()))
    }

    async fn turn_counter(&self, session_id: SessionId) -> Result<Arc<AtomicU64>, EngineError> {
        let sessions = self.sessions.read().await;
        let components = sessions
            .get(&session_id)
            .ok_or_else(|| EngineError::Session(crate::types::SessionError::NotFound(session_id.to_string())))?;
        Ok(components.turns.clone())
    }

    /// Appends one user or assistant message, then runs a compression pass
    /// if the available budget's trigger ratio has been crossed. Returns
    /// once the pass (if any) has committed or confirmed there was nothing
    /// to do; `CompressionExhausted` is surfaced to the caller rather than
    /// silently swallowed.
    pub async fn append_message(&self, session: &Session, role: MessageRole, content: impl Into<String>) -> Result<(), EngineError> {
        let (context, _mode) = self.components(session.session_id).await?;
        let turns = self.turn_counter(session.session_id).await?;
        let current_turn = turns.fetch_add(1, Ordering::SeqCst) + 1;

        let counter = SimpleTokenCounter;
        let message = Message::new(role, content, &counter);

        context.append(message.clone(), session.window_tokens).await?;
        self.history.append_message(session, &message).await?;

        let ctx = context.clone_context().await;
        let available = self.compression.available_budget(
            session.window_tokens,
            ctx.system_prompt_tokens(&counter),
            ctx.checkpoint_tokens(),
        );
        if self.compression.should_trigger(ctx.recent_tokens(), available) {
            match self.compression.run_pass(session, &context, current_turn).await {
                Ok(_) => {
                    // Re-derive pressure against the post-compression budget
                    // rather than assuming it still holds (§4.3's aging
                    // condition is an AND of turn age and live pressure).
                    let post_ctx = context.clone_context().await;
                    let post_available = self.compression.available_budget(
                        session.window_tokens,
                        post_ctx.system_prompt_tokens(&counter),
                        post_ctx.checkpoint_tokens(),
                    );
                    let pressure_persists = self.compression.should_trigger(post_ctx.recent_tokens(), post_available);
                    self.compression
                        .age_checkpoints(
                            session,
                            &context,
                            |cp| current_turn.saturating_sub(cp.created_at_turn) as u32,
                            pressure_persists,
                        )
                        .await?;
                }
                Err(e) => warn!(session_id = %session.session_id, error = %e, "compression pass failed"),
            }
        }
        Ok(())
    }

    /// Validates the assembled request before a send; on failure runs a
    /// fresh compression pass, and if the request still does not fit, takes
    /// an emergency snapshot and reports `CannotFit`.
    pub async fn prepare_turn(&self, session: &Session, mode: Mode, turn_context: &TurnContext) -> Result<String, EngineError> {
        let (context, mode_machine) = self.components(session.session_id).await?;
        let counter = SimpleTokenCounter;
        let tier = crate::types::Tier::for_window_tokens(session.window_tokens);
        let system_prompt = self.prompt_assembler.assemble(mode, tier, turn_context);
        context.set_system_prompt(system_prompt.clone()).await;

        let ctx = context.clone_context().await;
        if self
            .prompt_assembler
            .validate(&ctx, session.window_tokens, self.config.compression.reserve_tokens, &counter)
            .is_ok()
        {
            return Ok(system_prompt);
        }

        let current_turn = self.turn_counter(session.session_id).await?.load(Ordering::SeqCst);
        self.compression.run_pass(session, &context, current_turn).await?;
        let ctx = context.clone_context().await;
        if self
            .prompt_assembler
            .validate(&ctx, session.window_tokens, self.config.compression.reserve_tokens, &counter)
            .is_ok()
        {
            return Ok(system_prompt);
        }

        let mode_state = mode_machine.current().await;
        let _ = self
            .snapshots
            .create(session, &context, &ModeState::new(mode_state), SnapshotPurpose::Emergency, None)
            .await;
        Err(EngineError::Prompt(PromptError::DoesNotFit))
    }

    pub async fn execute(&self, command: EngineCommand) -> Result<(), EngineError> {
        match command {
            EngineCommand::Clear { session_id } => {
                let (context, _) = self.components(session_id).await?;
                context.clear().await;
                Ok(())
            }
            EngineCommand::New { model_id, profile, pending_window } => {
                self.new_session(model_id, profile, pending_window).await?;
                Ok(())
            }
            EngineCommand::Snapshot { session_id, tag } => {
                let session = self.session_manager.get(session_id).await?;
                let (context, mode_machine) = self.components(session_id).await?;
                let mode_state_value = ModeState::new(mode_machine.current().await);
                self.snapshots
                    .create(&session, &context, &mode_state_value, SnapshotPurpose::UserRequest, tag)
                    .await?;
                Ok(())
            }
            EngineCommand::Restore { session_id, target } => {
                let session = self.session_manager.get(session_id).await?;
                let (context, mode_machine) = self.components(session_id).await?;
                let id = match target {
                    RestoreTarget::Id(id) => id,
                    RestoreTarget::Latest => {
                        let listed = self.snapshots.list(&session, None).await?;
                        listed
                            .first()
                            .map(|d| d.id)
                            .ok_or_else(|| EngineError::Snapshot(crate::types::SnapshotError::NotFound("no snapshots".into())))?
                    }
                };
                let mode_state = self.snapshots.restore(&session, &context, id).await?;
                mode_machine.restore_state(&session, mode_state).await?;
                Ok(())
            }
            EngineCommand::Mode { session_id, mode } => {
                let session = self.session_manager.get(session_id).await?;
                let (context, mode_machine) = self.components(session_id).await?;
                mode_machine.transition(&session, &context, mode, TransitionCause::Manual).await
            }
            EngineCommand::Compact { session_id } => {
                let session = self.session_manager.get(session_id).await?;
                let (context, _) = self.components(session_id).await?;
                let current_turn = self.turn_counter(session_id).await?.load(Ordering::SeqCst);
                self.compression.run_pass(&session, &context, current_turn).await?;
                info!(session_id = %session_id, "compaction forced via command");
                Ok(())
            }
        }
    }
}

impl Drop for ContextOrchestrator {
    fn drop(&mut self) {
        self.vram_cancel.cancel();
        self.vram_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullProvider;
    use tempfile::TempDir;

    fn profile() -> ModelProfile {
        ModelProfile { max_context: 32_768, bytes_per_token: 128 * 1024 }
    }

    #[tokio::test]
    async fn new_session_wires_context_and_mode_components() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ContextOrchestrator::new(dir.path().to_path_buf(), Arc::new(NullProvider), EngineConfig::default());

        let session = orchestrator.new_session("model-a", profile(), None).await.unwrap();
        let (context, mode_machine) = orchestrator.components(session.session_id).await.unwrap();
        assert!(context.snapshot_view().await.recent_messages.is_empty());
        assert_eq!(mode_machine.current().await, Mode::Assistant);
    }

    #[tokio::test]
    async fn append_message_persists_to_history_and_active_context() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ContextOrchestrator::new(dir.path().to_path_buf(), Arc::new(NullProvider), EngineConfig::default());
        let session = orchestrator.new_session("model-a", profile(), None).await.unwrap();

        orchestrator.append_message(&session, MessageRole::User, "hello").await.unwrap();

        let (context, _) = orchestrator.components(session.session_id).await.unwrap();
        let view = context.snapshot_view().await;
        assert_eq!(view.recent_messages.len(), 1);
    }

    #[tokio::test]
    async fn clear_command_empties_active_context_without_touching_history() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ContextOrchestrator::new(dir.path().to_path_buf(), Arc::new(NullProvider), EngineConfig::default());
        let session = orchestrator.new_session("model-a", profile(), None).await.unwrap();
        orchestrator.append_message(&session, MessageRole::User, "hello").await.unwrap();

        orchestrator.execute(EngineCommand::Clear { session_id: session.session_id }).await.unwrap();

        let (context, _) = orchestrator.components(session.session_id).await.unwrap();
        assert!(context.snapshot_view().await.recent_messages.is_empty());
        let history = orchestrator.history.load_messages(&session).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
