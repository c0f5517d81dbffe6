//! Full, uncompressed recovery points. Snapshots are never sent to the LLM.

use crate::types::checkpoint::CheckpointSummary;
use crate::types::ids::{SessionId, SnapshotId};
use crate::types::messages::Message;
use crate::types::mode::ModeState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why a snapshot was taken, per the four trigger types the coordinator
/// recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPurpose {
    ModeTransition,
    Milestone,
    UserRequest,
    Emergency,
}

/// A full, uncompressed recovery point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub session_id: SessionId,
    pub purpose: SnapshotPurpose,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub checkpoint_state: Vec<CheckpointSummary>,
    pub mode_state: ModeState,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Lightweight listing entry, returned by `SnapshotCoordinator::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    pub id: SnapshotId,
    pub session_id: SessionId,
    pub purpose: SnapshotPurpose,
    pub timestamp: DateTime<Utc>,
    pub tag: Option<String>,
}

impl From<&Snapshot> for SnapshotDescriptor {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id,
            session_id: snapshot.session_id,
            purpose: snapshot.purpose,
            timestamp: snapshot.timestamp,
            tag: snapshot.metadata.get("tag").cloned(),
        }
    }
}

/// Retention policy applied by `SnapshotCoordinator::prune`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub keep_last_mode_transitions: usize,
    pub keep_all_milestones: bool,
    pub keep_emergencies_for_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_last_mode_transitions: 5,
            keep_all_milestones: true,
            keep_emergencies_for_days: 7,
        }
    }
}
