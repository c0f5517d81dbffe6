//! Shared error category and trait for consistent error handling across crates.

use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

/// Category of error for consistent handling and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User input or configuration error — correctable by the caller.
    User,
    /// System resource or environmental error — may be temporary.
    System,
    /// Internal logic error — indicates a bug.
    Internal,
    /// Provider or external-service error — may be retriable.
    External,
}

/// Trait implemented by every error type in the context engine.
///
/// Every variant surfaced to a caller carries a short `error_code` and a
/// `user_friendly_message` with an actionable hint, per the engine's error
/// handling design.
pub trait LlamaError: std::error::Error + Send + Sync + Debug {
    fn category(&self) -> ErrorCategory;

    fn error_code(&self) -> &'static str;

    fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    fn is_retriable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::System | ErrorCategory::External
        )
    }

    fn user_friendly_message(&self) -> String {
        format!("{}", self)
    }

    fn recovery_suggestions(&self) -> Vec<String> {
        match self.category() {
            ErrorCategory::User => vec![
                "Check the request parameters".to_string(),
                "Review session/engine configuration".to_string(),
            ],
            ErrorCategory::System => vec![
                "Check disk space and process limits".to_string(),
                "Retry the operation".to_string(),
            ],
            ErrorCategory::External => vec![
                "Check provider connectivity".to_string(),
                "Retry after a brief delay".to_string(),
            ],
            ErrorCategory::Internal => vec![
                "Report this as a bug".to_string(),
                "Include the session id and error code".to_string(),
            ],
        }
    }

    fn custom_retry_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn should_stop_retrying(&self, _attempt: u32) -> bool {
        false
    }
}

/// Base error type for leaf utilities that don't warrant their own enum.
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Resource error: {message}")]
    Resource { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LlamaError for CommonError {
    fn category(&self) -> ErrorCategory {
        match self {
            CommonError::Configuration { .. } => ErrorCategory::User,
            CommonError::Validation { .. } => ErrorCategory::User,
            CommonError::Resource { .. } => ErrorCategory::System,
            CommonError::Internal { .. } => ErrorCategory::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CommonError::Configuration { .. } => "COMMON_CONFIG",
            CommonError::Validation { .. } => "COMMON_VALIDATION",
            CommonError::Resource { .. } => "COMMON_RESOURCE",
            CommonError::Internal { .. } => "COMMON_INTERNAL",
        }
    }
}
