//! Generic error handling utilities
//!
//! Errors surfaced at startup are either something the user can fix (a bad
//! configuration value) or a system failure (a signal handler that could not
//! be installed). The first kind is reported verbatim, the second with the
//! operation context and the details at debug level.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with the detail level its kind calls for
///
/// # Examples
/// ```rust,no_run
/// # use finalizer::core::error_handling::log_error_with_context;
/// # use finalizer::finalizer::FinalizerError;
/// let err = FinalizerError::Configuration {
///     message: "timeout_ms must be greater than 0".to_string(),
/// };
/// log_error_with_context(&err, "Loading configuration");
/// // Logs: "FATAL: timeout_ms must be greater than 0"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message().filter(|_| error.is_user_actionable()) {
        Some(user_msg) => log::error!("FATAL: {}", user_msg),
        None => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
