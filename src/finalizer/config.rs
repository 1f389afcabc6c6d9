//! Finalizer run settings
//!
//! Both knobs are read at the start of every drain, so they can be changed
//! between drains but never affect one already in progress.

use crate::finalizer::error::{FinalizerError, FinalizerResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Serializable finalizer settings (`[at_exit]` / `[at_alarm]` tables)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinalizerConfig {
    /// Per-item timeout in milliseconds
    pub timeout_ms: u64,
    /// Run all items at once instead of one after another
    pub parallel: bool,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            parallel: false,
        }
    }
}

impl FinalizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject settings that would make every item fail
    pub fn validate(&self) -> FinalizerResult<()> {
        if self.timeout_ms == 0 {
            return Err(FinalizerError::Configuration {
                message: "timeout_ms must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
