//! Finalizer Error Types

use crate::core::error_handling::ContextualError;

#[derive(Debug, thiserror::Error)]
pub enum FinalizerError {
    #[error("Finalizer registry unavailable: {message}")]
    Synchronisation { message: String },

    #[error("Failed to spawn finalizer thread for item added at {origin}: {message}")]
    Spawn { origin: String, message: String },

    #[error("Invalid finalizer configuration: {message}")]
    Configuration { message: String },
}

impl ContextualError for FinalizerError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, FinalizerError::Configuration { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            FinalizerError::Configuration { message } => Some(message),
            _ => None,
        }
    }
}

/// Result type for finalizer operations
pub type FinalizerResult<T> = Result<T, FinalizerError>;
