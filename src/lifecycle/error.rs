//! Lifecycle Error Types

use crate::core::error_handling::ContextualError;
use crate::finalizer::api::FinalizerError;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Failed to install handler for {signal}: {message}")]
    SignalSetup {
        signal: &'static str,
        message: String,
    },

    #[error("Finalizer setup failed")]
    Finalizer {
        #[from]
        #[source]
        source: FinalizerError,
    },
}

impl ContextualError for LifecycleError {
    fn is_user_actionable(&self) -> bool {
        match self {
            LifecycleError::SignalSetup { .. } => false,
            LifecycleError::Finalizer { source } => source.is_user_actionable(),
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            LifecycleError::SignalSetup { .. } => None,
            LifecycleError::Finalizer { source } => source.user_message(),
        }
    }
}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;
