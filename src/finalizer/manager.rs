//! Finalizer - registration front end
//!
//! Owns the registry and the run settings. Execution lives in the engine
//! module; this file covers construction, configuration and registration.

use crate::finalizer::config::{FinalizerConfig, DEFAULT_TIMEOUT};
use crate::finalizer::error::FinalizerResult;
use crate::finalizer::item::{describe_location, Action, FinalizerId};
use crate::finalizer::registry::Registry;
use crate::finalizer::rendezvous::Rendezvous;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Registry of cleanup actions drained under a per-item timeout
///
/// # Thread Safety
///
/// Registration, removal and the setters take `&self` and may be called from
/// any thread, so a `Finalizer` is usually shared as `Arc<Finalizer>`.
/// Mutating the registry while a drain is running only affects later drains.
///
/// # Example
///
/// ```rust
/// use finalizer::finalizer::Finalizer;
/// use std::time::Duration;
///
/// let finalizer = Finalizer::new()
///     .with_timeout(Duration::from_millis(500))
///     .with_parallel(true);
///
/// let id = finalizer.add(|| println!("flushing")).unwrap();
/// assert!(finalizer.run());
///
/// finalizer.remove(id).unwrap();
/// assert!(finalizer.is_empty().unwrap());
/// ```
#[derive(Debug)]
pub struct Finalizer {
    pub(crate) registry: Registry,
    parallel: AtomicBool,
    timeout_nanos: AtomicU64,
}

impl Default for Finalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Finalizer {
    /// Serial finalizer with the default 5 second timeout
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            parallel: AtomicBool::new(false),
            timeout_nanos: AtomicU64::new(duration_to_nanos(DEFAULT_TIMEOUT)),
        }
    }

    pub fn from_config(config: &FinalizerConfig) -> FinalizerResult<Self> {
        config.validate()?;
        Ok(Self::new()
            .with_timeout(config.timeout())
            .with_parallel(config.parallel))
    }

    pub fn with_parallel(self, parallel: bool) -> Self {
        self.set_parallel(parallel);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }

    pub fn set_parallel(&self, parallel: bool) -> &Self {
        self.parallel.store(parallel, Ordering::Release);
        self
    }

    pub fn set_timeout(&self, timeout: Duration) -> &Self {
        self.timeout_nanos
            .store(duration_to_nanos(timeout), Ordering::Release);
        self
    }

    pub fn parallel(&self) -> bool {
        self.parallel.load(Ordering::Acquire)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_nanos(self.timeout_nanos.load(Ordering::Acquire))
    }

    /// Register a cleanup closure
    ///
    /// The closure may run once per drain; drains never remove it.
    #[track_caller]
    pub fn add<F>(&self, f: F) -> FinalizerResult<FinalizerId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let origin = describe_location(Location::caller());
        self.registry.push(Action::from_fn(f), origin)
    }

    /// Register an explicit action variant
    #[track_caller]
    pub fn add_action(&self, action: Action) -> FinalizerResult<FinalizerId> {
        let origin = describe_location(Location::caller());
        self.registry.push(action, origin)
    }

    /// Register an item whose cleanup is performed by the caller's own task
    ///
    /// The returned handle receives a [`Completion`](crate::finalizer::Completion)
    /// during every drain; the drain waits (up to the timeout) for
    /// `Completion::done()`.
    #[track_caller]
    pub fn add_rendezvous(&self) -> FinalizerResult<Rendezvous> {
        let origin = describe_location(Location::caller());
        self.registry.push_rendezvous(origin)
    }

    /// Forget a registration. Unknown or already removed handles are ignored.
    pub fn remove(&self, handle: impl Into<FinalizerId>) -> FinalizerResult<()> {
        self.registry.remove(handle.into())
    }

    pub fn len(&self) -> FinalizerResult<usize> {
        self.registry.len()
    }

    pub fn is_empty(&self) -> FinalizerResult<bool> {
        Ok(self.registry.len()? == 0)
    }

    /// Registration handles in execution order
    pub fn ids(&self) -> FinalizerResult<Vec<FinalizerId>> {
        Ok(self
            .registry
            .snapshot()?
            .iter()
            .map(|item| item.id())
            .collect())
    }

    /// Registration sites (`file.rs:line`) in execution order
    pub fn origins(&self) -> FinalizerResult<Vec<String>> {
        Ok(self
            .registry
            .snapshot()?
            .iter()
            .map(|item| item.origin().to_string())
            .collect())
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
