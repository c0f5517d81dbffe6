//! Session and session-history data entities.

use crate::types::checkpoint::CheckpointRecord;
use crate::types::ids::SessionId;
use crate::types::messages::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One conversation, pinned to one model, with a window fixed for its
/// lifetime (invariant 4/7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub model_id: String,
    pub window_tokens: usize,
    pub created_at: DateTime<Utc>,
    pub root_dir: PathBuf,
}

impl Session {
    pub fn new(model_id: impl Into<String>, window_tokens: usize, storage_root: &std::path::Path) -> Self {
        let session_id = SessionId::new();
        let root_dir = storage_root.join(session_id.to_string());
        Self {
            session_id,
            model_id: model_id.into(),
            window_tokens,
            created_at: Utc::now(),
            root_dir,
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.root_dir.join("history.jsonl")
    }

    pub fn checkpoints_path(&self) -> PathBuf {
        self.root_dir.join("checkpoints.json")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root_dir.join("snapshots")
    }

    pub fn mode_path(&self) -> PathBuf {
        self.root_dir.join("mode.json")
    }
}

/// Aggregate, append-only, durable record of a conversation. Never
/// compressed; bytes used for audit come only from here (invariant 1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionHistory {
    pub messages: Vec<Message>,
    pub checkpoint_records: Vec<CheckpointRecord>,
}

impl SessionHistory {
    pub fn total_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn total_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.token_count).sum()
    }
}
