//! Rendezvous Handshake
//!
//! Lets a long-lived task own and pace its shutdown work while still being
//! subject to the finalizer's timeout accounting.
//!
//! Two single-slot channels are involved:
//!
//! ```text
//!   engine (trampoline)                       registering task
//!   ───────────────────                       ────────────────
//!   create completion slot
//!   try_send(Completion) ──── outer slot ───▶ Rendezvous::wait()
//!                                              ... own cleanup ...
//!   recv() ◀─────────────── completion slot ── Completion::done()
//! ```
//!
//! The outer slot lives as long as the registration; the completion slot is
//! created fresh for every drain. Handshake progress is observable through
//! [`HandshakeState`]: `Idle → AwaitingHandoff → AwaitingCompletion → Done`,
//! restarting at `AwaitingHandoff` on the next drain. Every drain starts a new
//! generation; a [`Completion`] left over from an earlier drain can no longer
//! move the state.

use crate::core::sync::{lock_ignoring_poison, lock_until, try_lock_ignoring_poison};
use crate::finalizer::item::FinalizerId;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Progress of the most recent handshake for one rendezvous item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Registered, never drained
    Idle,
    /// Engine offered a completion slot, caller has not taken it yet
    AwaitingHandoff,
    /// Caller holds the completion slot and is cleaning up
    AwaitingCompletion,
    /// Caller signalled completion
    Done,
}

impl HandshakeState {
    fn from_bits(raw: u64) -> Self {
        match raw {
            1 => HandshakeState::AwaitingHandoff,
            2 => HandshakeState::AwaitingCompletion,
            3 => HandshakeState::Done,
            _ => HandshakeState::Idle,
        }
    }

    fn as_bits(self) -> u64 {
        match self {
            HandshakeState::Idle => 0,
            HandshakeState::AwaitingHandoff => 1,
            HandshakeState::AwaitingCompletion => 2,
            HandshakeState::Done => 3,
        }
    }
}

const STATE_BITS: u32 = 2;
const STATE_MASK: u64 = (1 << STATE_BITS) - 1;

/// Drain generation and handshake state packed into one word
#[derive(Debug)]
struct SharedState(AtomicU64);

impl SharedState {
    fn new() -> Self {
        Self(AtomicU64::new(HandshakeState::Idle.as_bits()))
    }

    fn pack(generation: u64, state: HandshakeState) -> u64 {
        (generation << STATE_BITS) | state.as_bits()
    }

    fn get(&self) -> HandshakeState {
        HandshakeState::from_bits(self.0.load(Ordering::Acquire) & STATE_MASK)
    }

    /// Open a new generation in `AwaitingHandoff` and return its number
    fn begin(&self) -> u64 {
        let mut generation = 0;
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                generation = (raw >> STATE_BITS).wrapping_add(1);
                Some(Self::pack(generation, HandshakeState::AwaitingHandoff))
            });
        generation
    }

    /// Move to `state` if `generation` is still the current one
    fn advance(&self, generation: u64, state: HandshakeState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (raw >> STATE_BITS == generation).then(|| Self::pack(generation, state))
            })
            .is_ok()
    }
}

/// Engine side of a rendezvous registration
pub struct Handoff {
    outer: SyncSender<Completion>,
    state: Arc<SharedState>,
}

impl Handoff {
    /// Offer a fresh completion slot to the registering task and block until
    /// it reports completion.
    pub(crate) fn trampoline(&self) -> bool {
        let (token_tx, token_rx) = mpsc::sync_channel::<()>(1);
        let generation = self.state.begin();
        let completion = Completion {
            token: token_tx,
            fired: AtomicBool::new(false),
            generation,
            state: Arc::clone(&self.state),
        };

        match self.outer.try_send(completion) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("rendezvous handoff from a previous drain was never taken");
                return false;
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("rendezvous handle dropped before the handoff");
                return false;
            }
        }

        match token_rx.recv() {
            Ok(()) => true,
            Err(_) => {
                log::warn!("rendezvous completion dropped without done()");
                false
            }
        }
    }
}

impl fmt::Debug for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handoff")
            .field("state", &self.state.get())
            .finish()
    }
}

/// Why a non-blocking or bounded wait returned without a handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// Nothing handed over in time, or another clone is already waiting
    #[error("no rendezvous handoff pending")]
    Empty,
    #[error("rendezvous registration closed")]
    Closed,
}

/// Caller side of a rendezvous registration
///
/// Doubles as the removal handle (see [`Rendezvous::id`]). Clones share the
/// same outer slot; only one of them receives a given handoff.
#[derive(Clone)]
pub struct Rendezvous {
    id: FinalizerId,
    outer: Arc<Mutex<Receiver<Completion>>>,
    state: Arc<SharedState>,
}

impl Rendezvous {
    pub fn id(&self) -> FinalizerId {
        self.id
    }

    pub fn state(&self) -> HandshakeState {
        self.state.get()
    }

    /// Block until the engine hands over a completion slot.
    ///
    /// Returns `None` once the registration is gone (removed from the
    /// finalizer, or the finalizer itself dropped).
    pub fn wait(&self) -> Option<Completion> {
        let outer = lock_ignoring_poison(&self.outer);
        outer.recv().ok().map(|completion| self.taken(completion))
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`
    ///
    /// Time spent behind a clone that is already waiting counts against
    /// `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Completion, WaitError> {
        let deadline = Instant::now() + timeout;
        let outer = lock_until(&self.outer, deadline).ok_or(WaitError::Empty)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        match outer.recv_timeout(remaining) {
            Ok(completion) => Ok(self.taken(completion)),
            Err(RecvTimeoutError::Timeout) => Err(WaitError::Empty),
            Err(RecvTimeoutError::Disconnected) => Err(WaitError::Closed),
        }
    }

    /// Take a pending handoff without blocking
    ///
    /// Reports [`WaitError::Empty`] while another clone holds the slot in a
    /// blocking wait.
    pub fn try_wait(&self) -> Result<Completion, WaitError> {
        let outer = try_lock_ignoring_poison(&self.outer).ok_or(WaitError::Empty)?;
        match outer.try_recv() {
            Ok(completion) => Ok(self.taken(completion)),
            Err(TryRecvError::Empty) => Err(WaitError::Empty),
            Err(TryRecvError::Disconnected) => Err(WaitError::Closed),
        }
    }

    fn taken(&self, completion: Completion) -> Completion {
        self.state
            .advance(completion.generation, HandshakeState::AwaitingCompletion);
        completion
    }
}

impl fmt::Debug for Rendezvous {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendezvous")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish()
    }
}

impl From<&Rendezvous> for FinalizerId {
    fn from(rendezvous: &Rendezvous) -> Self {
        rendezvous.id
    }
}

/// Completion slot handed to the registering task for one drain
pub struct Completion {
    token: SyncSender<()>,
    fired: AtomicBool,
    generation: u64,
    state: Arc<SharedState>,
}

impl Completion {
    /// Report that cleanup finished.
    ///
    /// Only the first call has an effect and returns `true`. A completion
    /// from a drain that already gave up leaves the current state alone.
    pub fn done(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.state.advance(self.generation, HandshakeState::Done);
        // The engine may have stopped listening after a timeout
        let _ = self.token.try_send(());
        true
    }

    pub fn is_done(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("generation", &self.generation)
            .field("done", &self.is_done())
            .finish()
    }
}

/// Create both ends of a rendezvous registration
pub(crate) fn pair(id: FinalizerId) -> (Handoff, Rendezvous) {
    let (outer_tx, outer_rx) = mpsc::sync_channel::<Completion>(1);
    let state = Arc::new(SharedState::new());
    let handoff = Handoff {
        outer: outer_tx,
        state: Arc::clone(&state),
    };
    let rendezvous = Rendezvous {
        id,
        outer: Arc::new(Mutex::new(outer_rx)),
        state,
    };
    (handoff, rendezvous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_state_round_trips_through_bits() {
        for state in [
            HandshakeState::Idle,
            HandshakeState::AwaitingHandoff,
            HandshakeState::AwaitingCompletion,
            HandshakeState::Done,
        ] {
            assert_eq!(HandshakeState::from_bits(state.as_bits()), state);
        }
    }

    #[test]
    fn test_trampoline_completes_when_caller_signals_done() {
        let (handoff, rendezvous) = pair(FinalizerId::new(1));
        assert_eq!(rendezvous.state(), HandshakeState::Idle);

        let caller = thread::spawn(move || {
            let completion = rendezvous.wait().expect("handoff");
            assert_eq!(rendezvous.state(), HandshakeState::AwaitingCompletion);
            completion.done();
            rendezvous
        });

        assert!(handoff.trampoline());
        let rendezvous = caller.join().unwrap();
        assert_eq!(rendezvous.state(), HandshakeState::Done);
    }

    #[test]
    fn test_trampoline_fails_when_completion_dropped() {
        let (handoff, rendezvous) = pair(FinalizerId::new(2));

        let caller = thread::spawn(move || {
            let completion = rendezvous.wait().expect("handoff");
            drop(completion);
        });

        assert!(!handoff.trampoline());
        caller.join().unwrap();
    }

    #[test]
    fn test_trampoline_fails_when_handle_dropped() {
        let (handoff, rendezvous) = pair(FinalizerId::new(3));
        drop(rendezvous);

        assert!(!handoff.trampoline());
    }

    #[test]
    fn test_done_twice_is_harmless() {
        let (handoff, rendezvous) = pair(FinalizerId::new(4));

        let caller = thread::spawn(move || {
            let completion = rendezvous.wait().expect("handoff");
            assert!(completion.done());
            assert!(!completion.done());
            assert!(completion.is_done());
        });

        assert!(handoff.trampoline());
        caller.join().unwrap();
    }

    #[test]
    fn test_wait_returns_none_once_registration_dropped() {
        let (handoff, rendezvous) = pair(FinalizerId::new(5));
        drop(handoff);

        assert!(rendezvous.wait().is_none());
        assert_eq!(rendezvous.try_wait().unwrap_err(), WaitError::Closed);
    }

    #[test]
    fn test_wait_timeout_without_handoff() {
        let (_handoff, rendezvous) = pair(FinalizerId::new(6));

        assert_eq!(
            rendezvous
                .wait_timeout(Duration::from_millis(20))
                .unwrap_err(),
            WaitError::Empty
        );
        assert_eq!(rendezvous.state(), HandshakeState::Idle);
    }

    #[test]
    fn test_handle_converts_into_id() {
        let (_handoff, rendezvous) = pair(FinalizerId::new(7));
        let id: FinalizerId = (&rendezvous).into();
        assert_eq!(id, rendezvous.id());
    }

    #[test]
    fn test_try_wait_does_not_queue_behind_waiting_clone() {
        let (_handoff, rendezvous) = pair(FinalizerId::new(8));
        let waiter = rendezvous.clone();
        let parked = thread::spawn(move || waiter.wait_timeout(Duration::from_millis(800)));
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        assert_eq!(rendezvous.try_wait().unwrap_err(), WaitError::Empty);
        assert!(started.elapsed() < Duration::from_millis(100));

        assert_eq!(parked.join().unwrap().unwrap_err(), WaitError::Empty);
    }

    #[test]
    fn test_wait_timeout_keeps_deadline_behind_blocking_clone() {
        let (handoff, rendezvous) = pair(FinalizerId::new(9));
        let waiter = rendezvous.clone();
        let parked = thread::spawn(move || waiter.wait().is_none());
        thread::sleep(Duration::from_millis(30));

        let started = Instant::now();
        assert_eq!(
            rendezvous
                .wait_timeout(Duration::from_millis(50))
                .unwrap_err(),
            WaitError::Empty
        );
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_millis(400));

        drop(handoff);
        assert!(parked.join().unwrap());
    }

    #[test]
    fn test_stale_completion_leaves_next_drain_state_alone() {
        let (handoff, rendezvous) = pair(FinalizerId::new(10));
        let handoff = Arc::new(handoff);

        let engine = Arc::clone(&handoff);
        let first = thread::spawn(move || engine.trampoline());
        let stale = rendezvous.wait().expect("first handoff");

        let engine = Arc::clone(&handoff);
        let second = thread::spawn(move || engine.trampoline());
        while rendezvous.state() != HandshakeState::AwaitingHandoff {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(stale.done());
        assert!(first.join().unwrap());
        assert_eq!(rendezvous.state(), HandshakeState::AwaitingHandoff);

        let fresh = rendezvous.wait().expect("second handoff");
        assert_eq!(rendezvous.state(), HandshakeState::AwaitingCompletion);
        assert!(fresh.done());
        assert!(second.join().unwrap());
        assert_eq!(rendezvous.state(), HandshakeState::Done);
    }

    #[test]
    fn test_concurrent_done_fires_once() {
        let (handoff, rendezvous) = pair(FinalizerId::new(11));
        let engine = thread::spawn(move || handoff.trampoline());
        let completion = Arc::new(rendezvous.wait().expect("handoff"));

        let barrier = Arc::new(std::sync::Barrier::new(8));
        let callers: Vec<_> = (0..8)
            .map(|_| {
                let completion = Arc::clone(&completion);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    completion.done()
                })
            })
            .collect();
        let fired = callers
            .into_iter()
            .map(|caller| caller.join().unwrap())
            .filter(|fired| *fired)
            .count();

        assert_eq!(fired, 1);
        assert!(engine.join().unwrap());
        assert_eq!(rendezvous.state(), HandshakeState::Done);
    }
}
