//! Ordered finalizer registry
//!
//! Insertion order is significant: it is the serial execution order and the
//! order items are enumerated in. All mutation happens under one mutex; the
//! engine works on a snapshot so it never holds the lock while actions run.

use crate::core::sync::handle_mutex_poison;
use crate::finalizer::error::{FinalizerError, FinalizerResult};
use crate::finalizer::item::{Action, FinalizerId, Item};
use crate::finalizer::rendezvous::{self, Rendezvous};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub(crate) struct Registry {
    next_id: AtomicU64,
    items: Mutex<Vec<Arc<Item>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> FinalizerResult<MutexGuard<'_, Vec<Arc<Item>>>> {
        handle_mutex_poison(self.items.lock(), |message| {
            FinalizerError::Synchronisation { message }
        })
    }

    fn next_id(&self) -> FinalizerId {
        FinalizerId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn push(&self, action: Action, origin: String) -> FinalizerResult<FinalizerId> {
        let id = self.next_id();
        let item = Arc::new(Item::new(id, action, origin));
        self.lock()?.push(item);
        log::trace!("finalizer {} registered", id);
        Ok(id)
    }

    pub fn push_rendezvous(&self, origin: String) -> FinalizerResult<Rendezvous> {
        let id = self.next_id();
        let (handoff, handle) = rendezvous::pair(id);
        let item = Arc::new(Item::new(id, Action::Rendezvous(Arc::new(handoff)), origin));
        self.lock()?.push(item);
        log::trace!("rendezvous finalizer {} registered", id);
        Ok(handle)
    }

    /// Drop the item registered under `id`; unknown ids are ignored
    pub fn remove(&self, id: FinalizerId) -> FinalizerResult<()> {
        let mut items = self.lock()?;
        let before = items.len();
        items.retain(|item| item.id() != id);
        if items.len() != before {
            log::trace!("finalizer {} removed", id);
        }
        Ok(())
    }

    /// Items in registration order, detached from the lock
    pub fn snapshot(&self) -> FinalizerResult<Vec<Arc<Item>>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> FinalizerResult<usize> {
        Ok(self.lock()?.len())
    }
}
