//! Public API for the finalizer component
//!
//! External modules should import from here rather than from the internal
//! modules. See the module documentation for usage examples.

// Registration and execution
pub use crate::finalizer::manager::Finalizer;

// Item model
pub use crate::finalizer::item::{Action, FinalizerFn, FinalizerId};

// Rendezvous handshake
pub use crate::finalizer::rendezvous::{Completion, HandshakeState, Rendezvous, WaitError};

// Settings
pub use crate::finalizer::config::{FinalizerConfig, DEFAULT_TIMEOUT};

// Error handling
pub use crate::finalizer::error::{FinalizerError, FinalizerResult};
