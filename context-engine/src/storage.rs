//! Durable on-disk record of a conversation: `SessionHistory` persistence.
//!
//! Grounded on the teacher's `SessionStorage` trait / `FileSessionStorage`
//! (`llama-agent::storage`), generalized from one JSON-file-per-session into
//! the spec's three-file-per-session layout
//! (`history.jsonl` + `checkpoints.json` + `mode.json`).

use crate::fsutil::{append_line, atomic_write};
use crate::types::{CheckpointRecord, EngineError, Message, ModeState, Session, SessionError};
use async_trait::async_trait;
use tracing::debug;

/// Append-only, never-compressed durable history for one session.
#[async_trait]
pub trait SessionHistoryStore: Send + Sync {
    /// Appends exactly one message, synchronously with respect to the
    /// caller (invariant 6: every message appears in history exactly once,
    /// in arrival order).
    async fn append_message(&self, session: &Session, message: &Message) -> Result<(), EngineError>;

    /// Appends a checkpoint record (metadata only — the underlying history
    /// messages are never deleted).
    async fn append_checkpoint_record(&self, session: &Session, record: &CheckpointRecord) -> Result<(), EngineError>;

    async fn load_checkpoint_records(&self, session: &Session) -> Result<Vec<CheckpointRecord>, EngineError>;

    async fn load_messages(&self, session: &Session) -> Result<Vec<Message>, EngineError>;

    async fn save_mode_state(&self, session: &Session, mode_state: &ModeState) -> Result<(), EngineError>;

    async fn load_mode_state(&self, session: &Session) -> Result<Option<ModeState>, EngineError>;
}

/// File-based implementation: `history.jsonl` is append-only (one message
/// per line); `checkpoints.json` and `mode.json` are rewritten atomically
/// via write-temp-and-rename on every update, matching the teacher's
/// session/metadata file handling.
#[derive(Debug, Clone, Default)]
pub struct FileSessionHistoryStore;

impl FileSessionHistoryStore {
    pub fn new() -> Self {
        Self
    }

    fn io_err(e: std::io::Error) -> EngineError {
        EngineError::Session(SessionError::StorageUnavailable(e.to_string()))
    }

    fn json_err(e: serde_json::Error) -> EngineError {
        EngineError::Session(SessionError::InvalidState(e.to_string()))
    }
}

#[async_trait]
impl SessionHistoryStore for FileSessionHistoryStore {
    async fn append_message(&self, session: &Session, message: &Message) -> Result<(), EngineError> {
        let line = serde_json::to_string(message).map_err(Self::json_err)?;
        append_line(&session.history_path(), &line).await.map_err(Self::io_err)?;
        debug!(session_id = %session.session_id, message_id = %message.id, "message appended to history");
        Ok(())
    }

    async fn append_checkpoint_record(&self, session: &Session, record: &CheckpointRecord) -> Result<(), EngineError> {
        let mut records = self.load_checkpoint_records(session).await?;
        records.push(record.clone());
        let json = serde_json::to_vec_pretty(&records).map_err(Self::json_err)?;
        atomic_write(&session.checkpoints_path(), &json).await.map_err(Self::io_err)
    }

    async fn load_checkpoint_records(&self, session: &Session) -> Result<Vec<CheckpointRecord>, EngineError> {
        let path = session.checkpoints_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read(&path).await.map_err(Self::io_err)?;
        serde_json::from_slice(&content).map_err(Self::json_err)
    }

    async fn load_messages(&self, session: &Session) -> Result<Vec<Message>, EngineError> {
        let path = session.history_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path).await.map_err(Self::io_err)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Self::json_err))
            .collect()
    }

    async fn save_mode_state(&self, session: &Session, mode_state: &ModeState) -> Result<(), EngineError> {
        let json = serde_json::to_vec_pretty(mode_state).map_err(Self::json_err)?;
        atomic_write(&session.mode_path(), &json).await.map_err(Self::io_err)
    }

    async fn load_mode_state(&self, session: &Session) -> Result<Option<ModeState>, EngineError> {
        let path = session.mode_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read(&path).await.map_err(Self::io_err)?;
        Ok(Some(serde_json::from_slice(&content).map_err(Self::json_err)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageRole, SimpleTokenCounter, TokenCounter};
    use tempfile::TempDir;

    fn test_session(root: &std::path::Path) -> Session {
        Session::new("model-a", 4096, root)
    }

    #[tokio::test]
    async fn messages_round_trip_in_arrival_order() {
        let dir = TempDir::new().unwrap();
        let session = test_session(dir.path());
        let store = FileSessionHistoryStore::new();
        let counter = SimpleTokenCounter;

        let m1 = Message::new(MessageRole::User, "first", &counter);
        let m2 = Message::new(MessageRole::Assistant, "second", &counter);
        store.append_message(&session, &m1).await.unwrap();
        store.append_message(&session, &m2).await.unwrap();

        let loaded = store.load_messages(&session).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, m1.id);
        assert_eq!(loaded[1].id, m2.id);
    }

    #[tokio::test]
    async fn checkpoint_records_accumulate() {
        let dir = TempDir::new().unwrap();
        let session = test_session(dir.path());
        let store = FileSessionHistoryStore::new();

        let cp = crate::types::CheckpointSummary::new(vec![], "s".into(), 100, 40, 0);
        let record = CheckpointRecord::from(&cp);
        store.append_checkpoint_record(&session, &record).await.unwrap();

        let records = store.load_checkpoint_records(&session).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn mode_state_persists_and_loads() {
        let dir = TempDir::new().unwrap();
        let session = test_session(dir.path());
        let store = FileSessionHistoryStore::new();

        assert!(store.load_mode_state(&session).await.unwrap().is_none());
        let state = ModeState::default();
        store.save_mode_state(&session, &state).await.unwrap();
        let loaded = store.load_mode_state(&session).await.unwrap().unwrap();
        assert_eq!(loaded.mode, state.mode);
    }
}
