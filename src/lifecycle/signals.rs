//! Signal Coordination
//!
//! Connects OS signals to a [`Lifecycle`]:
//!
//! - `SIGALRM` drains the alarm finalizer (on the blocking pool, repeatable)
//! - `SIGINT` / `SIGTERM` mark shutdown as requested and notify subscribers;
//!   a second termination signal exits immediately with status 130
//! - `SIGHUP` is ignored
//!
//! Handlers are registered synchronously by [`SignalCoordinator::install`],
//! which must be called from within a Tokio runtime.

use crate::lifecycle::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::Lifecycle;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Termination-class signal delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl TerminationSignal {
    pub fn name(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
        }
    }
}

/// Routes OS signals to the lifecycle finalizers
pub struct SignalCoordinator {
    shutdown_tx: broadcast::Sender<TerminationSignal>,
    shutdown_requested: Arc<AtomicBool>,
    alarms_received: Arc<AtomicUsize>,
}

impl SignalCoordinator {
    /// Create a coordinator without touching OS signal dispositions
    pub fn new() -> (Self, broadcast::Receiver<TerminationSignal>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);
        let coordinator = Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            alarms_received: Arc::new(AtomicUsize::new(0)),
        };
        (coordinator, shutdown_rx)
    }

    /// Register signal handlers for `lifecycle`
    ///
    /// SIGALRM is handled completely here. SIGINT and SIGTERM only mark
    /// shutdown as requested and notify the returned receiver and every
    /// [`subscribe`](Self::subscribe) receiver: the process is neither drained nor
    /// terminated until the caller reacts with [`Lifecycle::exit`] or
    /// [`Lifecycle::shutdown`]. A second termination signal exits with
    /// status 130 regardless.
    ///
    /// ```rust,no_run
    /// # use finalizer::lifecycle::{Lifecycle, SignalCoordinator};
    /// # use std::sync::Arc;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let lifecycle = Arc::new(Lifecycle::new());
    /// let (_signals, mut shutdown_rx) = SignalCoordinator::install(lifecycle.clone())?;
    ///
    /// shutdown_rx.recv().await?;
    /// let drain = lifecycle.clone();
    /// tokio::task::spawn_blocking(move || drain.exit(0)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn install(
        lifecycle: Arc<Lifecycle>,
    ) -> LifecycleResult<(Self, broadcast::Receiver<TerminationSignal>)> {
        let (coordinator, shutdown_rx) = Self::new();
        setup_signal_handlers(
            lifecycle,
            coordinator.shutdown_tx.clone(),
            coordinator.shutdown_requested.clone(),
            coordinator.alarms_received.clone(),
        )?;
        Ok((coordinator, shutdown_rx))
    }

    /// Subscribe to termination notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TerminationSignal> {
        self.shutdown_tx.subscribe()
    }

    /// Request shutdown as if `signal` had been delivered
    pub fn trigger_shutdown(&self, signal: TerminationSignal) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(signal);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Number of alarm signals handled so far
    pub fn alarms_received(&self) -> usize {
        self.alarms_received.load(Ordering::Acquire)
    }
}

fn setup_error(signal: &'static str, error: std::io::Error) -> LifecycleError {
    LifecycleError::SignalSetup {
        signal,
        message: error.to_string(),
    }
}

fn handle_alarm(lifecycle: &Arc<Lifecycle>, alarms_received: &AtomicUsize) {
    log::warn!("signal SIGALRM received");
    alarms_received.fetch_add(1, Ordering::AcqRel);
    let lifecycle = Arc::clone(lifecycle);
    tokio::task::spawn_blocking(move || lifecycle.alarm());
}

fn handle_termination(
    signal: TerminationSignal,
    shutdown_tx: &broadcast::Sender<TerminationSignal>,
    shutdown_requested: &AtomicBool,
    termination_count: &mut usize,
) {
    log::warn!("signal {} received, exiting...", signal.name());
    *termination_count += 1;
    shutdown_requested.store(true, Ordering::Release);
    let _ = shutdown_tx.send(signal);
    if *termination_count > 1 {
        log::warn!("second termination signal received; exiting immediately");
        std::process::exit(130);
    }
}

#[cfg(unix)]
fn setup_signal_handlers(
    lifecycle: Arc<Lifecycle>,
    shutdown_tx: broadcast::Sender<TerminationSignal>,
    shutdown_requested: Arc<AtomicBool>,
    alarms_received: Arc<AtomicUsize>,
) -> LifecycleResult<()> {
    use tokio::signal::unix::{signal, SignalKind};

    unsafe {
        libc::signal(libc::SIGHUP, libc::SIG_IGN);
    }

    let mut alarm = signal(SignalKind::alarm()).map_err(|e| setup_error("SIGALRM", e))?;
    let mut interrupt =
        signal(SignalKind::interrupt()).map_err(|e| setup_error("SIGINT", e))?;
    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| setup_error("SIGTERM", e))?;

    tokio::spawn(async move {
        let mut termination_count = 0usize;
        loop {
            tokio::select! {
                Some(()) = alarm.recv() => {
                    handle_alarm(&lifecycle, &alarms_received);
                }
                Some(()) = interrupt.recv() => {
                    handle_termination(
                        TerminationSignal::Interrupt,
                        &shutdown_tx,
                        &shutdown_requested,
                        &mut termination_count,
                    );
                }
                Some(()) = terminate.recv() => {
                    handle_termination(
                        TerminationSignal::Terminate,
                        &shutdown_tx,
                        &shutdown_requested,
                        &mut termination_count,
                    );
                }
                else => break,
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(
    _lifecycle: Arc<Lifecycle>,
    shutdown_tx: broadcast::Sender<TerminationSignal>,
    shutdown_requested: Arc<AtomicBool>,
    _alarms_received: Arc<AtomicUsize>,
) -> LifecycleResult<()> {
    tokio::spawn(async move {
        let mut termination_count = 0usize;
        while tokio::signal::ctrl_c().await.is_ok() {
            handle_termination(
                TerminationSignal::Interrupt,
                &shutdown_tx,
                &shutdown_requested,
                &mut termination_count,
            );
        }
    });
    Ok(())
}
