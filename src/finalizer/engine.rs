//! Execution engine
//!
//! Every item runs on its own OS thread and is raced against a deadline.
//! A timed-out action is abandoned, not stopped: its thread keeps running and
//! the drain moves on. Serial mode only decides when the next item starts.

use crate::finalizer::error::FinalizerError;
use crate::finalizer::item::{Action, Item};
use crate::finalizer::manager::Finalizer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

impl Finalizer {
    /// Drain every registered item and report whether all finished in time.
    ///
    /// Items stay registered, so a finalizer can be drained repeatedly.
    pub fn run(&self) -> bool {
        let items = match self.registry.snapshot() {
            Ok(items) => items,
            Err(e) => {
                log::error!("finalizer drain aborted: {}", e);
                return false;
            }
        };
        let timeout = self.timeout();
        let parallel = self.parallel();
        let started = Instant::now();
        log::debug!(
            "draining {} finalizer(s), {} mode, timeout {:?}",
            items.len(),
            if parallel { "parallel" } else { "serial" },
            timeout
        );

        let ok = AtomicBool::new(true);
        if parallel {
            thread::scope(|scope| {
                for item in &items {
                    let ok = &ok;
                    scope.spawn(move || {
                        if !run_bounded(item, timeout) {
                            ok.store(false, Ordering::Release);
                        }
                    });
                }
            });
        } else {
            for item in &items {
                if !run_bounded(item, timeout) {
                    ok.store(false, Ordering::Release);
                }
            }
        }

        let ok = ok.into_inner();
        log::debug!(
            "finalizer drain finished in {:?}: {}",
            started.elapsed(),
            if ok { "ok" } else { "failed" }
        );
        ok
    }
}

/// Execute one item under `timeout`, blocking until it finishes or expires
fn run_bounded(item: &Arc<Item>, timeout: Duration) -> bool {
    if let Action::Noop = item.action() {
        return true;
    }

    let (report_tx, report_rx) = mpsc::sync_channel::<bool>(1);
    let action = item.action().clone();
    let spawned = thread::Builder::new()
        .name(format!("finalizer-{}", item.id()))
        .spawn(move || {
            let ok = action.execute();
            // Nobody listens any more once the deadline passed
            let _ = report_tx.send(ok);
        });
    if let Err(e) = spawned {
        let error = FinalizerError::Spawn {
            origin: item.origin().to_string(),
            message: e.to_string(),
        };
        log::warn!("{}", error);
        return false;
    }

    match report_rx.recv_timeout(timeout) {
        Ok(ok) => ok,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!(
                "finalizer timeout {:?} (added at {})",
                timeout,
                item.origin()
            );
            false
        }
        Err(RecvTimeoutError::Disconnected) => {
            log::warn!("finalizer panicked (added at {})", item.origin());
            false
        }
    }
}
