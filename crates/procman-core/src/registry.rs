use crate::process::ProcessIdentifier;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Concurrency-safe store of live process handles keyed by identifier.
///
/// Bridges a `start` call and a later `end` call. Cloning shares the
/// underlying map; each engine owns its own registry.
pub struct ProcessRegistry<H> {
    entries: Arc<Mutex<HashMap<ProcessIdentifier, H>>>,
}

impl<H> Clone for ProcessRegistry<H> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<H> Default for ProcessRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ProcessRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a freshly started handle.
    ///
    /// Identifiers are unique per spawn; a collision is a caller bug and the
    /// previous handle is dropped.
    pub fn put(&self, id: ProcessIdentifier, handle: H) {
        let previous = self.entries.lock().insert(id, handle);
        debug_assert!(previous.is_none(), "process identifier {id} registered twice");
        if previous.is_some() {
            warn!(identifier = %id, "Replaced an already registered process handle");
        } else {
            debug!(identifier = %id, "Registered process handle");
        }
    }

    /// Remove and return the handle for `id`.
    ///
    /// `None` if the identifier was never registered or was already taken.
    pub fn take(&self, id: &ProcessIdentifier) -> Option<H> {
        self.entries.lock().remove(id)
    }

    pub fn contains(&self, id: &ProcessIdentifier) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the identifiers currently registered
    pub fn identifiers(&self) -> Vec<ProcessIdentifier> {
        self.entries.lock().keys().copied().collect()
    }

    /// Visit every registered handle without removing it.
    ///
    /// Runs under the registry lock: `f` must not call back into the
    /// registry.
    pub fn for_each_mut<F>(&self, mut f: F)
    where
        F: FnMut(&ProcessIdentifier, &mut H),
    {
        let mut entries = self.entries.lock();
        for (id, handle) in entries.iter_mut() {
            f(id, handle);
        }
    }
}
