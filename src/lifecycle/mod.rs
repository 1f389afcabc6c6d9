//! Process lifecycle context
//!
//! Bundles the two finalizers a process typically needs: one drained exactly
//! once when the process exits, and one drained every time an alarm fires.
//! The context is built by the caller and passed to whoever needs it; there
//! are no process-wide instances.

mod error;
pub mod signals;

pub use error::{LifecycleError, LifecycleResult};
pub use signals::{SignalCoordinator, TerminationSignal};

use crate::finalizer::api::{Finalizer, FinalizerConfig};
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit and alarm finalizers plus the double-exit guard
#[derive(Debug, Default)]
pub struct Lifecycle {
    at_exit: Finalizer,
    at_alarm: Finalizer,
    exit_in_progress: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_finalizers(at_exit: Finalizer, at_alarm: Finalizer) -> Self {
        Self {
            at_exit,
            at_alarm,
            exit_in_progress: AtomicBool::new(false),
        }
    }

    pub fn from_configs(
        at_exit: &FinalizerConfig,
        at_alarm: &FinalizerConfig,
    ) -> LifecycleResult<Self> {
        Ok(Self::with_finalizers(
            Finalizer::from_config(at_exit)?,
            Finalizer::from_config(at_alarm)?,
        ))
    }

    /// Finalizer drained once on exit
    pub fn at_exit(&self) -> &Finalizer {
        &self.at_exit
    }

    /// Finalizer drained on every alarm
    pub fn at_alarm(&self) -> &Finalizer {
        &self.at_alarm
    }

    /// Drain the alarm finalizer. Repeatable.
    pub fn alarm(&self) -> bool {
        let ok = self.at_alarm.run();
        if !ok {
            log::warn!("alarm finalizers did not complete in time");
        }
        ok
    }

    pub fn is_exiting(&self) -> bool {
        self.exit_in_progress.load(Ordering::Acquire)
    }

    /// Drain the exit finalizer once.
    ///
    /// The first caller gets `Some(ok)`; every later (or concurrent) caller
    /// gets `None` without waiting.
    pub fn shutdown(&self) -> Option<bool> {
        if self
            .exit_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("shutdown already in progress");
            return None;
        }

        log::info!("stopping...");
        let ok = self.at_exit.run();
        log::info!("stopped!");
        Some(ok)
    }

    /// Drain the exit finalizer and terminate the process.
    ///
    /// Returns only when another caller already owns the shutdown.
    pub fn exit(&self, code: i32) {
        if let Some(ok) = self.shutdown() {
            std::process::exit(exit_code(ok, code));
        }
    }
}

/// Map a drain result onto a process exit code
///
/// A failed drain turns a requested success code into `1`; explicit failure
/// codes are kept.
pub fn exit_code(ok: bool, requested: i32) -> i32 {
    if !ok && requested == 0 {
        1
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_shutdown_runs_exit_finalizers_once() {
        let lifecycle = Lifecycle::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        lifecycle
            .at_exit()
            .add(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(!lifecycle.is_exiting());
        assert_eq!(lifecycle.shutdown(), Some(true));
        assert!(lifecycle.is_exiting());
        assert_eq!(lifecycle.shutdown(), None);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_shutdown_has_single_winner() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle
            .at_exit()
            .add(|| thread::sleep(Duration::from_millis(50)))
            .unwrap();

        let callers: Vec<_> = (0..4)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                thread::spawn(move || lifecycle.shutdown())
            })
            .collect();
        let results: Vec<_> = callers.into_iter().map(|c| c.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
        assert!(results.contains(&Some(true)));
    }

    #[test]
    fn test_exit_after_shutdown_returns() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.shutdown(), Some(true));
        // Guard already taken, so this must not terminate the test process
        lifecycle.exit(0);
    }

    #[test]
    fn test_alarm_is_repeatable_and_independent() {
        let lifecycle = Lifecycle::new();
        let alarms = Arc::new(AtomicUsize::new(0));
        let counter = alarms.clone();
        lifecycle
            .at_alarm()
            .add(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(lifecycle.alarm());
        assert!(lifecycle.alarm());
        assert_eq!(alarms.load(Ordering::SeqCst), 2);
        assert!(lifecycle.at_exit().is_empty().unwrap());
        assert!(!lifecycle.is_exiting());
    }

    #[test]
    fn test_from_configs_applies_settings() {
        let at_exit = FinalizerConfig {
            timeout_ms: 250,
            parallel: true,
        };
        let lifecycle = Lifecycle::from_configs(&at_exit, &FinalizerConfig::default()).unwrap();

        assert!(lifecycle.at_exit().parallel());
        assert_eq!(lifecycle.at_exit().timeout(), Duration::from_millis(250));
        assert!(!lifecycle.at_alarm().parallel());
    }

    #[test]
    fn test_from_configs_rejects_zero_timeout() {
        let broken = FinalizerConfig {
            timeout_ms: 0,
            parallel: false,
        };
        let err = Lifecycle::from_configs(&FinalizerConfig::default(), &broken).unwrap_err();
        assert!(matches!(err, LifecycleError::Finalizer { .. }));
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(true, 0), 0);
        assert_eq!(exit_code(false, 0), 1);
        assert_eq!(exit_code(false, 3), 3);
        assert_eq!(exit_code(true, 2), 2);
    }
}
