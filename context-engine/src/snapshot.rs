//! `SnapshotCoordinator`: full, uncompressed recovery points, written and
//! restored atomically.
//!
//! Grounded on the teacher's session-file persistence
//! (`llama-agent::storage::FileSessionStorage`) for the write-temp/fsync/
//! rename discipline, generalized from "one file per session" into "one
//! file per snapshot under the session's `snapshots/` directory".

use crate::active_context_store::ActiveContextStore;
use crate::events::{EngineEvent, EventBus};
use crate::fsutil::{atomic_write, remove_stray_temp_files};
use crate::types::{
    ActiveContext, EngineError, ModeState, RetentionPolicy, Session, Snapshot, SnapshotDescriptor, SnapshotError,
    SnapshotId, SnapshotPurpose,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct SnapshotCoordinator {
    events: EventBus,
    retention: RetentionPolicy,
}

impl SnapshotCoordinator {
    pub fn new(events: EventBus, retention: RetentionPolicy) -> Self {
        Self { events, retention }
    }

    /// Removes any `.tmp` file left behind by a write that crashed between
    /// the temp-file write and the rename (scenario: crash mid-snapshot).
    /// Safe to call on every startup; a directory with no stray files is a
    /// no-op.
    pub async fn recover_startup(&self, session: &Session) -> Result<usize, EngineError> {
        remove_stray_temp_files(&session.snapshots_dir())
            .await
            .map_err(|e| EngineError::Snapshot(SnapshotError::Io(e.to_string())))
    }

    /// Writes a full, uncompressed recovery point. The write is atomic: a
    /// reader never observes a partially written snapshot file, and a crash
    /// mid-write leaves the prior snapshot set untouched.
    pub async fn create(
        &self,
        session: &Session,
        store: &ActiveContextStore,
        mode_state: &ModeState,
        purpose: SnapshotPurpose,
        tag: Option<String>,
    ) -> Result<Snapshot, EngineError> {
        let ctx = store.clone_context().await;
        let mut metadata = HashMap::new();
        if let Some(tag) = tag {
            metadata.insert("tag".to_string(), tag);
        }

        let snapshot = Snapshot {
            id: SnapshotId::new(),
            session_id: session.session_id,
            purpose,
            timestamp: Utc::now(),
            messages: ctx.recent_messages,
            checkpoint_state: ctx.checkpoint_summaries,
            mode_state: mode_state.clone(),
            metadata,
        };

        let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| EngineError::Snapshot(SnapshotError::Serialization(e.to_string())))?;
        atomic_write(&self.snapshot_path(session, snapshot.id), &json)
            .await
            .map_err(|e| EngineError::Snapshot(SnapshotError::Io(e.to_string())))?;

        info!(session_id = %session.session_id, snapshot_id = %snapshot.id, ?purpose, "snapshot created");
        self.events.publish(EngineEvent::SnapshotCreated {
            id: snapshot.id,
            purpose: snapshot.purpose,
        });

        Ok(snapshot)
    }

    /// Lists snapshots for a session, newest first. `purpose` filters to one
    /// trigger type when given.
    pub async fn list(&self, session: &Session, purpose: Option<SnapshotPurpose>) -> Result<Vec<SnapshotDescriptor>, EngineError> {
        let mut descriptors = Vec::new();
        let dir = session.snapshots_dir();
        if !dir.exists() {
            return Ok(descriptors);
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| EngineError::Snapshot(SnapshotError::Io(e.to_string())))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EngineError::Snapshot(SnapshotError::Io(e.to_string())))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let snapshot = self.read_snapshot_file(&path).await?;
            if purpose.map_or(true, |p| p == snapshot.purpose) {
                descriptors.push(SnapshotDescriptor::from(&snapshot));
            }
        }

        descriptors.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(descriptors)
    }

    /// Atomically reinstalls `ActiveContext` and mode state from the
    /// snapshot identified by `id`, then emits `SessionRestored`. Leaves
    /// current state untouched if the snapshot cannot be read.
    pub async fn restore(
        &self,
        session: &Session,
        store: &ActiveContextStore,
        id: SnapshotId,
    ) -> Result<ModeState, EngineError> {
        let path = self.snapshot_path(session, id);
        if !path.exists() {
            return Err(EngineError::Snapshot(SnapshotError::NotFound(id.to_string())));
        }
        let snapshot = self.read_snapshot_file(&path).await?;

        let restored = ActiveContext {
            system_prompt: String::new(),
            checkpoint_summaries: snapshot.checkpoint_state,
            recent_messages: snapshot.messages,
        };
        store.install(restored).await;

        info!(session_id = %session.session_id, snapshot_id = %id, "session restored from snapshot");
        self.events.publish(EngineEvent::SessionRestored { snapshot_id: id });

        Ok(snapshot.mode_state)
    }

    /// Applies the retention policy: keeps the most recent
    /// `keep_last_mode_transitions` mode-transition snapshots, all
    /// milestones when `keep_all_milestones`, and emergency snapshots newer
    /// than `keep_emergencies_for_days`. User-request snapshots are never
    /// pruned automatically.
    pub async fn prune(&self, session: &Session) -> Result<usize, EngineError> {
        let all = self.list(session, None).await?;
        let mut to_delete = Vec::new();

        let mode_transitions: Vec<_> = all.iter().filter(|d| d.purpose == SnapshotPurpose::ModeTransition).collect();
        if mode_transitions.len() > self.retention.keep_last_mode_transitions {
            to_delete.extend(mode_transitions[self.retention.keep_last_mode_transitions..].iter().map(|d| d.id));
        }

        if !self.retention.keep_all_milestones {
            to_delete.extend(all.iter().filter(|d| d.purpose == SnapshotPurpose::Milestone).map(|d| d.id));
        }

        let emergency_cutoff = Utc::now() - ChronoDuration::days(self.retention.keep_emergencies_for_days);
        to_delete.extend(
            all.iter()
                .filter(|d| d.purpose == SnapshotPurpose::Emergency && d.timestamp < emergency_cutoff)
                .map(|d| d.id),
        );

        let count = to_delete.len();
        for id in to_delete {
            let path = self.snapshot_path(session, id);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(snapshot_id = %id, error = %e, "failed to prune snapshot");
            }
        }
        Ok(count)
    }

    fn snapshot_path(&self, session: &Session, id: SnapshotId) -> PathBuf {
        session.snapshots_dir().join(format!("{id}.json"))
    }

    async fn read_snapshot_file(&self, path: &std::path::Path) -> Result<Snapshot, EngineError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::Snapshot(SnapshotError::Io(e.to_string())))?;
        serde_json::from_slice(&content).map_err(|e| EngineError::Snapshot(SnapshotError::Serialization(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mode, ModeState};
    use tempfile::TempDir;

    fn session(root: &std::path::Path) -> Session {
        Session::new("model-a", 4096, root)
    }

    #[tokio::test]
    async fn create_then_list_then_restore_round_trips() {
        let dir = TempDir::new().unwrap();
        let session = session(dir.path());
        tokio::fs::create_dir_all(session.snapshots_dir()).await.unwrap();

        let coordinator = SnapshotCoordinator::new(EventBus::default(), RetentionPolicy::default());
        let store = ActiveContextStore::new("system prompt");
        let mode_state = ModeState::new(Mode::Developer);

        let snapshot = coordinator
            .create(&session, &store, &mode_state, SnapshotPurpose::Milestone, Some("checkpoint-1".into()))
            .await
            .unwrap();

        let listed = coordinator.list(&session, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, snapshot.id);
        assert_eq!(listed[0].tag.as_deref(), Some("checkpoint-1"));

        let restored_mode = coordinator.restore(&session, &store, snapshot.id).await.unwrap();
        assert_eq!(restored_mode.mode, Mode::Developer);
    }

    #[tokio::test]
    async fn restore_of_unknown_snapshot_fails_without_touching_state() {
        let dir = TempDir::new().unwrap();
        let session = session(dir.path());
        tokio::fs::create_dir_all(session.snapshots_dir()).await.unwrap();
        let coordinator = SnapshotCoordinator::new(EventBus::default(), RetentionPolicy::default());
        let store = ActiveContextStore::new("sp");

        let result = coordinator.restore(&session, &store, SnapshotId::new()).await;
        assert!(matches!(result, Err(EngineError::Snapshot(SnapshotError::NotFound(_)))));
    }

    #[tokio::test]
    async fn recover_startup_clears_stray_temp_files() {
        let dir = TempDir::new().unwrap();
        let session = session(dir.path());
        tokio::fs::create_dir_all(session.snapshots_dir()).await.unwrap();
        tokio::fs::write(session.snapshots_dir().join("orphan.json.tmp"), b"partial")
            .await
            .unwrap();

        let coordinator = SnapshotCoordinator::new(EventBus::default(), RetentionPolicy::default());
        let removed = coordinator.recover_startup(&session).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn prune_keeps_only_the_most_recent_mode_transitions() {
        let dir = TempDir::new().unwrap();
        let session = session(dir.path());
        tokio::fs::create_dir_all(session.snapshots_dir()).await.unwrap();

        let mut retention = RetentionPolicy::default();
        retention.keep_last_mode_transitions = 1;
        let coordinator = SnapshotCoordinator::new(EventBus::default(), retention);
        let store = ActiveContextStore::new("sp");
        let mode_state = ModeState::default();

        for _ in 0..3 {
            coordinator
                .create(&session, &store, &mode_state, SnapshotPurpose::ModeTransition, None)
                .await
                .unwrap();
        }

        let pruned = coordinator.prune(&session).await.unwrap();
        assert_eq!(pruned, 2);
        let remaining = coordinator.list(&session, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }
}
