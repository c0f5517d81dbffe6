//! Checkpoint summaries: compressed replacements for a contiguous range of
//! past messages, aged through three levels as pressure persists.

use crate::types::ids::{CheckpointId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compression level of a checkpoint. Only ever increases for a given
/// checkpoint (invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionLevel {
    L1 = 1,
    L2 = 2,
    L3 = 3,
}

impl CompressionLevel {
    /// Target ratio of current tokens to the range's original tokens,
    /// per the aging table — configurable defaults, not fixed constants.
    pub fn default_target_ratio(self) -> f64 {
        match self {
            CompressionLevel::L1 => 0.40,
            CompressionLevel::L2 => 0.25,
            CompressionLevel::L3 => 0.15,
        }
    }

    /// Level-3 checkpoints are terminal: further compression is refused.
    pub fn is_terminal(self) -> bool {
        matches!(self, CompressionLevel::L3)
    }

    pub fn promote(self) -> Option<CompressionLevel> {
        match self {
            CompressionLevel::L1 => Some(CompressionLevel::L2),
            CompressionLevel::L2 => Some(CompressionLevel::L3),
            CompressionLevel::L3 => None,
        }
    }
}

/// A compressed summary of a contiguous range of past messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub id: CheckpointId,
    /// Ordered, contiguous list of the original message ids this checkpoint
    /// replaces.
    pub original_message_ids: Vec<MessageId>,
    pub summary_text: String,
    pub original_tokens: usize,
    pub current_tokens: usize,
    pub level: CompressionLevel,
    pub compression_number: u32,
    pub created_at: DateTime<Utc>,
    /// Conversational turn (per-session `append_message` count) the
    /// checkpoint was created on — aging is measured in turns elapsed since
    /// this value, never wall-clock time (§4.3).
    pub created_at_turn: u64,
    pub last_recompressed_at: DateTime<Utc>,
}

impl CheckpointSummary {
    pub fn new(
        original_message_ids: Vec<MessageId>,
        summary_text: String,
        original_tokens: usize,
        current_tokens: usize,
        created_at_turn: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CheckpointId::new(),
            original_message_ids,
            summary_text,
            original_tokens,
            current_tokens,
            level: CompressionLevel::L1,
            compression_number: 1,
            created_at: now,
            created_at_turn,
            last_recompressed_at: now,
        }
    }

    /// First message id the checkpoint covers — used to order checkpoints
    /// by the range they cover (invariant 3).
    pub fn range_start(&self) -> Option<MessageId> {
        self.original_message_ids.first().copied()
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.original_tokens == 0 {
            0.0
        } else {
            self.current_tokens as f64 / self.original_tokens as f64
        }
    }

    /// Records a recompression pass in place; the level only ever increases.
    pub fn recompress(&mut self, new_summary_text: String, new_current_tokens: usize) -> Result<(), &'static str> {
        let Some(next_level) = self.level.promote() else {
            return Err("checkpoint is already at the terminal compression level");
        };
        self.level = next_level;
        self.summary_text = new_summary_text;
        self.current_tokens = new_current_tokens;
        self.compression_number += 1;
        self.last_recompressed_at = Utc::now();
        Ok(())
    }
}

/// Metadata-only record of a compression event, appended to `SessionHistory`
/// without ever deleting the underlying history messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub checkpoint_id: CheckpointId,
    pub original_message_ids: Vec<MessageId>,
    pub level: CompressionLevel,
    pub compression_ratio: f64,
    pub created_at: DateTime<Utc>,
}

impl From<&CheckpointSummary> for CheckpointRecord {
    fn from(summary: &CheckpointSummary) -> Self {
        Self {
            checkpoint_id: summary.id,
            original_message_ids: summary.original_message_ids.clone(),
            level: summary.level,
            compression_ratio: summary.compression_ratio(),
            created_at: summary.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_never_decreases() {
        let mut cp = CheckpointSummary::new(vec![MessageId::new()], "s".into(), 1000, 400, 0);
        assert_eq!(cp.level, CompressionLevel::L1);
        cp.recompress("s2".into(), 250).unwrap();
        assert_eq!(cp.level, CompressionLevel::L2);
        cp.recompress("s3".into(), 150).unwrap();
        assert_eq!(cp.level, CompressionLevel::L3);
        assert!(cp.recompress("s4".into(), 100).is_err());
        assert_eq!(cp.level, CompressionLevel::L3);
    }

    #[test]
    fn terminal_level_refuses_further_compression() {
        assert!(CompressionLevel::L3.is_terminal());
        assert!(!CompressionLevel::L1.is_terminal());
    }
}
