//! Data model types for the conversational context engine.

pub mod active_context;
pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod ids;
pub mod messages;
pub mod mode;
pub mod session;
pub mod snapshot;
pub mod vram;

pub use active_context::{ActiveContext, ReadOnlyView};
pub use checkpoint::{CheckpointRecord, CheckpointSummary, CompressionLevel};
pub use config::{CompressionConfig, ConfigError, EngineConfig, SizingConfig, SnapshotConfig};
pub use errors::{CompressionError, EngineError, PromptError, SessionError, SizingError, SnapshotError};
pub use ids::{CheckpointId, MessageId, SessionId, SnapshotId};
pub use messages::{CharBasedTokenCounter, Message, MessageRole, SimpleTokenCounter, TokenCounter, ToolCall};
pub use mode::{Mode, ModeState, ModeTransition, TransitionCause};
pub use session::{Session, SessionHistory};
pub use snapshot::{RetentionPolicy, Snapshot, SnapshotDescriptor, SnapshotPurpose};
pub use vram::{Tier, VRAMReading, VRAMSample};
