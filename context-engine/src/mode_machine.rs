//! `ModeStateMachine`: the four-mode transition graph (assistant, planning,
//! developer, debugger).
//!
//! Grounded on the teacher's mode-switching contract
//! (`swissarmyhammer-modes`), which snapshots before switching and rolls
//! back on any step failure; narrowed here to the spec's fixed four-member
//! enum and single manual/auto transition path.

use crate::active_context_store::ActiveContextStore;
use crate::events::{EngineEvent, EventBus};
use crate::snapshot::SnapshotCoordinator;
use crate::storage::SessionHistoryStore;
use crate::types::{EngineError, Mode, ModeState, ModeTransition, PromptError, Session, SnapshotPurpose, TransitionCause};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

const KEEP_RECENT_TRANSITIONS: usize = 20;

/// The allowed tool set per mode, consulted by the `PromptAssembler` when
/// building the next request.
pub fn allowed_tools_for(mode: Mode) -> &'static [&'static str] {
    match mode {
        Mode::Assistant => &["search", "read_file"],
        Mode::Planning => &["search", "read_file", "write_plan"],
        Mode::Developer => &["search", "read_file", "write_file", "run_tests", "shell"],
        Mode::Debugger => &["search", "read_file", "run_tests", "shell", "inspect_stack"],
    }
}

pub struct ModeStateMachine {
    state: RwLock<ModeState>,
    history: Arc<dyn SessionHistoryStore>,
    snapshots: Arc<SnapshotCoordinator>,
    events: EventBus,
}

impl ModeStateMachine {
    pub fn new(
        initial: ModeState,
        history: Arc<dyn SessionHistoryStore>,
        snapshots: Arc<SnapshotCoordinator>,
        events: EventBus,
    ) -> Self {
        Self {
            state: RwLock::new(initial),
            history,
            snapshots,
            events,
        }
    }

    pub async fn current(&self) -> Mode {
        self.state.read().await.mode
    }

    /// Reinstalls `mode_state` wholesale, used by snapshot restore. Unlike
    /// `transition`, this does not itself snapshot or record a new
    /// `ModeTransition` entry — the state being installed already came from
    /// one.
    pub async fn restore_state(&self, session: &Session, mode_state: ModeState) -> Result<(), EngineError> {
        self.history.save_mode_state(session, &mode_state).await?;
        *self.state.write().await = mode_state;
        Ok(())
    }

    /// Performs a transition: snapshot the pre-transition state, commit the
    /// new mode to durable storage, then emit `ModeChanged`. Any failure
    /// before the final commit rolls the in-memory mode back to its
    /// pre-transition value, per the spec's "rollback on partial failure"
    /// requirement — the mode is never left observably half-switched.
    pub async fn transition(
        &self,
        session: &Session,
        store: &ActiveContextStore,
        to: Mode,
        cause: TransitionCause,
    ) -> Result<(), EngineError> {
        let from = self.current().await;
        if from == to {
            return Ok(());
        }

        let mode_state_before = self.state.read().await.clone();

        self.snapshots
            .create(session, store, &mode_state_before, SnapshotPurpose::ModeTransition, None)
            .await
            .map_err(|e| {
                warn!(from = from.as_str(), to = to.as_str(), error = %e, "mode transition snapshot failed; aborting");
                e
            })?;

        let transition = ModeTransition { from, to, cause, at: Utc::now() };

        let new_state = {
            let mut state = self.state.write().await;
            state.record_transition(transition, KEEP_RECENT_TRANSITIONS);
            state.clone()
        };

        if let Err(e) = self.history.save_mode_state(session, &new_state).await {
            warn!(from = from.as_str(), to = to.as_str(), error = %e, "mode transition commit failed; rolling back");
            *self.state.write().await = mode_state_before;
            return Err(EngineError::Prompt(PromptError::TransitionFailed(e.to_string())));
        }

        info!(session_id = %session.session_id, from = from.as_str(), to = to.as_str(), "mode transition committed");
        self.events.publish(EngineEvent::ModeChanged { from, to, cause });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileSessionHistoryStore;
    use tempfile::TempDir;

    fn session(root: &std::path::Path) -> Session {
        Session::new("model-a", 4096, root)
    }

    #[tokio::test]
    async fn transition_updates_current_mode_and_persists() {
        let dir = TempDir::new().unwrap();
        let session = session(dir.path());
        tokio::fs::create_dir_all(session.snapshots_dir()).await.unwrap();

        let history: Arc<dyn SessionHistoryStore> = Arc::new(FileSessionHistoryStore::new());
        let snapshots = Arc::new(SnapshotCoordinator::new(EventBus::default(), Default::default()));
        let machine = ModeStateMachine::new(ModeState::default(), history.clone(), snapshots, EventBus::default());
        let store = ActiveContextStore::new("sp");

        machine
            .transition(&session, &store, Mode::Developer, TransitionCause::Manual)
            .await
            .unwrap();

        assert_eq!(machine.current().await, Mode::Developer);
        let persisted = history.load_mode_state(&session).await.unwrap().unwrap();
        assert_eq!(persisted.mode, Mode::Developer);
    }

    #[tokio::test]
    async fn transition_to_same_mode_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let session = session(dir.path());
        tokio::fs::create_dir_all(session.snapshots_dir()).await.unwrap();

        let history: Arc<dyn SessionHistoryStore> = Arc::new(FileSessionHistoryStore::new());
        let snapshots = Arc::new(SnapshotCoordinator::new(EventBus::default(), Default::default()));
        let machine = ModeStateMachine::new(ModeState::default(), history, snapshots, EventBus::default());
        let store = ActiveContextStore::new("sp");

        machine
            .transition(&session, &store, Mode::Assistant, TransitionCause::Manual)
            .await
            .unwrap();
        assert_eq!(machine.current().await, Mode::Assistant);
    }

    #[test]
    fn each_mode_has_a_distinct_allowed_tool_set() {
        let sets: Vec<_> = Mode::ALL.iter().map(|m| allowed_tools_for(*m)).collect();
        assert!(sets.windows(2).all(|pair| pair[0] != pair[1]));
    }
}
