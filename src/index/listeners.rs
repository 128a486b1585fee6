//! Change listeners scoped to a [`Subscription`] guard

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registrations {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Set of listeners notified after each content change
#[derive(Default)]
pub struct Listeners {
    inner: Arc<Mutex<Registrations>>,
}

impl Listeners {
    pub fn add(&self, listener: Listener) -> Subscription {
        let mut registrations = lock(&self.inner);
        let id = registrations.next_id;
        registrations.next_id += 1;
        registrations.listeners.insert(id, listener);
        debug!("Registered index listener {}", id);

        Subscription {
            id,
            registrations: Arc::downgrade(&self.inner),
        }
    }

    /// Invokes every registered listener in registration order.
    pub fn notify(&self) {
        // Call outside the lock so listeners may subscribe or unsubscribe.
        let listeners: Vec<Listener> = lock(&self.inner).listeners.values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(registrations: &Mutex<Registrations>) -> std::sync::MutexGuard<'_, Registrations> {
    registrations
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps a listener registered. Dropping it removes the listener.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    id: u64,
    registrations: Weak<Mutex<Registrations>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registrations) = self.registrations.upgrade() {
            lock(&registrations).listeners.remove(&self.id);
            debug!("Removed index listener {}", self.id);
        }
    }
}
