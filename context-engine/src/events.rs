//! Closed-sum-type event bus, broadcast fire-and-forget, ordered per session.
//!
//! Grounded on the re-architecture guidance to replace an ad-hoc emitter
//! with "a closed sum type consumed by subscriber callbacks; a bounded
//! per-subscriber queue provides back-pressure" — implemented here with
//! `tokio::sync::broadcast`, whose bounded ring buffer gives every
//! subscriber its own queue and lags rather than blocks the publisher.

use crate::types::{CheckpointId, CompressionLevel, Mode, MessageId, MessageRole, SessionId, SnapshotId, SnapshotPurpose, TransitionCause};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    SessionChanged {
        session_id: SessionId,
        model_id: String,
        window_tokens: usize,
    },
    MessageAppended {
        message_id: MessageId,
        role: MessageRole,
        tokens: usize,
    },
    CheckpointCreated {
        id: CheckpointId,
        level: CompressionLevel,
        compression_ratio: f64,
        range_len: usize,
    },
    SnapshotCreated {
        id: SnapshotId,
        purpose: SnapshotPurpose,
    },
    SessionRestored {
        snapshot_id: SnapshotId,
    },
    ModeChanged {
        from: Mode,
        to: Mode,
        cause: TransitionCause,
    },
    LowMemory {
        free_bytes: u64,
        total_bytes: u64,
    },
    CriticalMemory {
        free_bytes: u64,
        total_bytes: u64,
    },
    ContextUsage {
        used: usize,
        budget: usize,
        checkpoint_tokens: usize,
    },
}

/// Publishes `EngineEvent`s to any number of subscribers. Cloning the bus
/// shares the same underlying channel, matching the teacher's
/// service-locator-with-a-single-init-point pattern for process-wide
/// facilities.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Fire-and-forget publish; a send with no subscribers is not an error.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(EngineEvent::LowMemory {
            free_bytes: 1,
            total_bytes: 10,
        });
        bus.publish(EngineEvent::CriticalMemory {
            free_bytes: 0,
            total_bytes: 10,
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, EngineEvent::LowMemory { .. }));
        assert!(matches!(second, EngineEvent::CriticalMemory { .. }));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.publish(EngineEvent::ContextUsage {
            used: 0,
            budget: 0,
            checkpoint_tokens: 0,
        });
    }
}
