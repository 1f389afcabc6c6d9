//! Finalizer Component
//!
//! A registry of cleanup actions drained with a per-action time budget when
//! the owning process shuts down (or on any other occasion that calls for it,
//! such as an alarm).
//!
//! # Overview
//!
//! - **Direct items**: a closure registered with [`Finalizer::add`], executed
//!   on its own thread during a drain
//! - **Rendezvous items**: registered with [`Finalizer::add_rendezvous`]; the
//!   registering task receives a [`Completion`] during the drain, performs the
//!   cleanup at its own pace and calls [`Completion::done`]
//! - **Serial or parallel**: serial drains start items one after another in
//!   registration order, parallel drains start them all at once
//! - **Timeouts**: each item gets the full timeout; an item that overruns is
//!   logged and fails the drain, but keeps running in the background
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use finalizer::finalizer::Finalizer;
//! use std::thread;
//! use std::time::Duration;
//!
//! let finalizer = Finalizer::new().with_timeout(Duration::from_secs(2));
//!
//! finalizer.add(|| println!("closing database")).unwrap();
//!
//! let stop = finalizer.add_rendezvous().unwrap();
//! thread::spawn(move || {
//!     // ... worker loop ...
//!     if let Some(completion) = stop.wait() {
//!         // flush, close, ...
//!         completion.done();
//!     }
//! });
//!
//! let ok = finalizer.run();
//! println!("all finalizers completed in time: {}", ok);
//! ```

mod config;
mod engine;
mod error;
mod item;
mod manager;
mod registry;
mod rendezvous;

pub mod api;

pub use config::{FinalizerConfig, DEFAULT_TIMEOUT};
pub use error::{FinalizerError, FinalizerResult};
pub use item::{Action, FinalizerFn, FinalizerId, Item};
pub use manager::Finalizer;
pub use rendezvous::{Completion, Handoff, HandshakeState, Rendezvous, WaitError};

#[cfg(test)]
mod tests;
