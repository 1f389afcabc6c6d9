//! Lock helpers shared by the finalizer registry and the rendezvous handles
//!
//! Two policies exist for a poisoned lock:
//!
//! - [`handle_mutex_poison`] turns the poison into a domain error, used where
//!   the guarded data could be half-updated (the registry vector)
//! - [`lock_ignoring_poison`] keeps going with the inner guard, used where the
//!   guarded value has no invariant a panic could break (a channel receiver)
//!
//! The bounded variants ([`try_lock_ignoring_poison`], [`lock_until`]) follow
//! the second policy.

use std::sync::{LockResult, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Convert a poisoned lock result into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use finalizer::core::sync::handle_mutex_poison;
/// use finalizer::finalizer::FinalizerError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(
///     mutex.lock(),
///     |message| FinalizerError::Synchronisation { message }
/// ).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "mutex poisoned by a panic while the lock was held ({:?})",
            poison_err
        ))
    })
}

/// Lock `mutex`, taking over the guard even if a previous holder panicked
pub fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lock `mutex` only if that does not block
pub fn try_lock_ignoring_poison<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Lock `mutex`, giving up once `deadline` has passed
pub fn lock_until<T>(mutex: &Mutex<T>, deadline: Instant) -> Option<MutexGuard<'_, T>> {
    loop {
        if let Some(guard) = try_lock_ignoring_poison(mutex) {
            return Some(guard);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(LOCK_POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finalizer::FinalizerError;
    use std::sync::Arc;
    use std::thread;

    fn poisoned(value: i32) -> Arc<Mutex<i32>> {
        let mutex = Arc::new(Mutex::new(value));
        let mutex_clone = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = mutex_clone.lock().unwrap();
            panic!("Intentional panic to poison mutex");
        })
        .join();
        mutex
    }

    #[test]
    fn test_handle_mutex_poison_success() {
        let mutex = Mutex::new(42);
        let result = handle_mutex_poison(mutex.lock(), |message| {
            FinalizerError::Synchronisation { message }
        });

        assert_eq!(*result.unwrap(), 42);
    }

    #[test]
    fn test_handle_mutex_poison_maps_to_domain_error() {
        let mutex = poisoned(42);

        let result = handle_mutex_poison(mutex.lock(), |message| {
            FinalizerError::Synchronisation { message }
        });

        match result {
            Err(FinalizerError::Synchronisation { message }) => {
                assert!(message.contains("mutex poisoned"));
            }
            other => panic!("expected synchronisation error, got {:?}", other.map(|g| *g)),
        }
    }

    #[test]
    fn test_lock_ignoring_poison_recovers_value() {
        let mutex = poisoned(7);
        assert_eq!(*lock_ignoring_poison(&mutex), 7);
    }

    #[test]
    fn test_try_lock_does_not_block_on_held_lock() {
        let mutex = Mutex::new(1);
        let _held = mutex.lock().unwrap();

        assert!(try_lock_ignoring_poison(&mutex).is_none());
    }

    #[test]
    fn test_try_lock_recovers_poisoned_lock() {
        let mutex = poisoned(3);
        assert_eq!(*try_lock_ignoring_poison(&mutex).unwrap(), 3);
    }

    #[test]
    fn test_lock_until_gives_up_at_deadline() {
        let mutex = Arc::new(Mutex::new(0));
        let holder = Arc::clone(&mutex);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let owner = thread::spawn(move || {
            let _guard = holder.lock().unwrap();
            locked_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        locked_rx.recv().unwrap();

        let started = Instant::now();
        assert!(lock_until(&mutex, started + Duration::from_millis(30)).is_none());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(30));
        assert!(waited < Duration::from_millis(500));

        release_tx.send(()).unwrap();
        owner.join().unwrap();
        assert!(lock_until(&mutex, Instant::now() + Duration::from_millis(500)).is_some());
    }
}
