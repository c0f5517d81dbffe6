//! Error types surfaced by the context engine.
//!
//! Follows the teacher's pattern: component-scoped `thiserror` enums
//! aggregated into a top-level `EngineError` via `#[from]`, each
//! implementing `LlamaError` for consistent categorization and
//! user-facing hints.

use context_engine_common::error::{ErrorCategory, LlamaError};
use std::time::Duration;
use thiserror::Error;

/// Top-level error returned by the `ContextOrchestrator` and the components
/// it coordinates.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session error: {0}\n💡 Verify the session id is correct and the session hasn't been cleared")]
    Session(#[from] SessionError),

    #[error("Compression error: {0}\n💡 Retry, or run `compact` again once the provider recovers")]
    Compression(#[from] CompressionError),

    #[error("Snapshot error: {0}\n💡 Check disk space and permissions under the session root")]
    Snapshot(#[from] SnapshotError),

    #[error("Sizing error: {0}\n💡 Check the model profile and VRAM probe configuration")]
    Sizing(#[from] SizingError),

    #[error("Prompt error: {0}\n💡 Reduce context usage or switch to a more compact mode")]
    Prompt(#[from] PromptError),

    #[error("Request would not fit the session window\n💡 Run `compact` to free space, then retry")]
    ValidationFailed,

    #[error("Request cannot fit even after compression and an emergency snapshot\n💡 Start a new session or restore a snapshot")]
    CannotFit,

    #[error("Message of {tokens} tokens exceeds the {window_tokens}-token window\n💡 Split the message or start a new session with a larger window")]
    WindowExceeded { tokens: usize, window_tokens: usize },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("Summarization failed: {0}")]
    Failed(String),

    #[error("Summarization timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("All eligible ranges are at the terminal compression level")]
    Exhausted,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Snapshot I/O failed: {0}")]
    Io(String),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(String),

    #[error("Snapshot creation timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

#[derive(Debug, Error)]
pub enum SizingError {
    #[error("Unknown model profile: {0}")]
    UnknownModel(String),

    #[error("Requested window {requested} exceeds the safe ceiling {ceiling}; clamped")]
    ClampedWindow { requested: usize, ceiling: usize },
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Mode transition failed mid-step: {0}")]
    TransitionFailed(String),

    #[error("Assembled prompt does not fit the window")]
    DoesNotFit,
}

impl LlamaError for EngineError {
    fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Session(e) => e.category(),
            EngineError::Compression(e) => e.category(),
            EngineError::Snapshot(e) => e.category(),
            EngineError::Sizing(e) => e.category(),
            EngineError::Prompt(e) => e.category(),
            EngineError::ValidationFailed => ErrorCategory::User,
            EngineError::CannotFit => ErrorCategory::System,
            EngineError::WindowExceeded { .. } => ErrorCategory::User,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            EngineError::Session(_) => "ENGINE_SESSION",
            EngineError::Compression(_) => "ENGINE_COMPRESSION",
            EngineError::Snapshot(_) => "ENGINE_SNAPSHOT",
            EngineError::Sizing(_) => "ENGINE_SIZING",
            EngineError::Prompt(_) => "ENGINE_PROMPT",
            EngineError::ValidationFailed => "ENGINE_VALIDATION_FAILED",
            EngineError::CannotFit => "ENGINE_CANNOT_FIT",
            EngineError::WindowExceeded { .. } => "ENGINE_WINDOW_EXCEEDED",
        }
    }
}

impl LlamaError for SessionError {
    fn category(&self) -> ErrorCategory {
        match self {
            SessionError::NotFound(_) => ErrorCategory::User,
            SessionError::ModelUnavailable(_) => ErrorCategory::System,
            SessionError::StorageUnavailable(_) => ErrorCategory::System,
            SessionError::InvalidState(_) => ErrorCategory::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            SessionError::NotFound(_) => "SESSION_NOT_FOUND",
            SessionError::ModelUnavailable(_) => "SESSION_MODEL_UNAVAILABLE",
            SessionError::StorageUnavailable(_) => "SESSION_STORAGE_UNAVAILABLE",
            SessionError::InvalidState(_) => "SESSION_INVALID_STATE",
        }
    }
}

impl LlamaError for CompressionError {
    fn category(&self) -> ErrorCategory {
        match self {
            CompressionError::Failed(_) => ErrorCategory::External,
            CompressionError::Timeout { .. } => ErrorCategory::External,
            CompressionError::Exhausted => ErrorCategory::System,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CompressionError::Failed(_) => "COMPRESSION_FAILED",
            CompressionError::Timeout { .. } => "COMPRESSION_TIMEOUT",
            CompressionError::Exhausted => "COMPRESSION_EXHAUSTED",
        }
    }

    fn is_retriable(&self) -> bool {
        !matches!(self, CompressionError::Exhausted)
    }
}

impl LlamaError for SnapshotError {
    fn category(&self) -> ErrorCategory {
        match self {
            SnapshotError::NotFound(_) => ErrorCategory::User,
            SnapshotError::Io(_) => ErrorCategory::System,
            SnapshotError::Serialization(_) => ErrorCategory::Internal,
            SnapshotError::Timeout { .. } => ErrorCategory::System,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            SnapshotError::NotFound(_) => "SNAPSHOT_NOT_FOUND",
            SnapshotError::Io(_) => "SNAPSHOT_IO",
            SnapshotError::Serialization(_) => "SNAPSHOT_SERIALIZATION",
            SnapshotError::Timeout { .. } => "SNAPSHOT_TIMEOUT",
        }
    }
}

impl LlamaError for SizingError {
    fn category(&self) -> ErrorCategory {
        match self {
            SizingError::UnknownModel(_) => ErrorCategory::User,
            SizingError::ClampedWindow { .. } => ErrorCategory::User,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            SizingError::UnknownModel(_) => "SIZING_UNKNOWN_MODEL",
            SizingError::ClampedWindow { .. } => "SIZING_CLAMPED_WINDOW",
        }
    }

    fn is_retriable(&self) -> bool {
        false
    }
}

impl LlamaError for PromptError {
    fn category(&self) -> ErrorCategory {
        match self {
            PromptError::TransitionFailed(_) => ErrorCategory::Internal,
            PromptError::DoesNotFit => ErrorCategory::System,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            PromptError::TransitionFailed(_) => "PROMPT_TRANSITION_FAILED",
            PromptError::DoesNotFit => "PROMPT_DOES_NOT_FIT",
        }
    }
}
