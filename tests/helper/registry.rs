//! Registry test utilities

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use gmaven_index::index::IndexProvider;
use gmaven_index::index::error::IndexError;
use gmaven_index::index::listeners::{Listener, Listeners, Subscription};

pub const SINGLE_CLASS_INDEX: &str = r#"{"Index":[{"groupId":"g","artifactId":"a","version":"1","ktxTargets":[],"fqcns":["p.C"]}]}"#;

/// Provider whose loads block until the gate is opened
pub struct GatedProvider {
    bytes: Vec<u8>,
    loads: AtomicUsize,
    open: Mutex<bool>,
    opened: Condvar,
    listeners: Listeners,
}

impl GatedProvider {
    pub fn new(bytes: &str) -> Self {
        Self {
            bytes: bytes.as_bytes().to_vec(),
            loads: AtomicUsize::new(0),
            open: Mutex::new(false),
            opened: Condvar::new(),
            listeners: Listeners::default(),
        }
    }

    /// A provider that never blocks
    pub fn opened(bytes: &str) -> Self {
        let provider = Self::new(bytes);
        provider.open_gate();
        provider
    }

    pub fn open_gate(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Simulates an index update
    pub fn notify_update(&self) {
        self.listeners.notify();
    }
}

impl IndexProvider for GatedProvider {
    fn load_index(&self) -> Result<Vec<u8>, IndexError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        Ok(self.bytes.clone())
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.listeners.add(listener)
    }
}
