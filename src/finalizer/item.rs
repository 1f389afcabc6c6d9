//! Registered finalizer items
//!
//! An [`Item`] pairs an [`Action`] with the source location it was registered
//! from. The set of action shapes is closed: anything that is not a niladic
//! callable, the rendezvous trampoline or the inert no-op cannot be expressed,
//! so there is no "unknown action" case left for the engine to report.

use crate::finalizer::rendezvous::Handoff;
use std::fmt;
use std::panic::Location;
use std::path::Path;
use std::sync::Arc;

/// Shared niladic cleanup callable
pub type FinalizerFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Opaque registration handle used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FinalizerId(u64);

impl FinalizerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for FinalizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the engine executes for one item
#[derive(Clone)]
pub enum Action {
    /// Inert item: counted as a silent success, never executed
    Noop,
    /// Direct callable run on its own thread
    Call(FinalizerFn),
    /// Trampoline handing completion control to the registering task
    Rendezvous(Arc<Handoff>),
}

impl Action {
    /// Wrap a closure as a direct-call action
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Action::Call(Arc::new(f))
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Action::Noop)
    }

    /// Run the action to completion on the current thread.
    ///
    /// Returns `false` when the action finished without accomplishing its
    /// contract (only the rendezvous trampoline can do that).
    pub(crate) fn execute(&self) -> bool {
        match self {
            Action::Noop => true,
            Action::Call(f) => {
                f();
                true
            }
            Action::Rendezvous(handoff) => handoff.trampoline(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Action::Noop => "noop",
            Action::Call(_) => "call",
            Action::Rendezvous(_) => "rendezvous",
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action::{}", self.kind())
    }
}

/// One registered cleanup unit
#[derive(Debug)]
pub struct Item {
    id: FinalizerId,
    action: Action,
    origin: String,
}

impl Item {
    pub(crate) fn new(id: FinalizerId, action: Action, origin: String) -> Self {
        Self { id, action, origin }
    }

    pub fn id(&self) -> FinalizerId {
        self.id
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// `file.rs:line` of the registration call
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Format a caller location as `file.rs:line`
pub(crate) fn describe_location(location: &Location<'_>) -> String {
    let file = Path::new(location.file())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "n/a".to_string());
    format!("{}:{}", file, location.line())
}
