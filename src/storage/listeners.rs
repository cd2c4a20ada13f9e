use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{Document, SnapshotCallback, StoreError};

/// Handle identifying one registered snapshot listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerRegistration {
    id: u64,
}

struct Listener {
    collection: String,
    callback: SnapshotCallback,
}

/// Listener bookkeeping shared by the store implementations.
///
/// Loading a snapshot and handing it out happen under one delivery lock,
/// so listeners see snapshots in the order they were loaded and a newer
/// snapshot is never overtaken by an older one.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Listener>>,
    delivery: Mutex<()>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, collection: &str, callback: SnapshotCallback) -> ListenerRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(
            id,
            Listener {
                collection: collection.to_string(),
                callback,
            },
        );
        log::debug!("Registered listener {id} on collection `{collection}`");
        ListenerRegistration { id }
    }

    /// Registers `callback` and hands it the result of `load` before any
    /// later change reaches it. Nothing is registered if `load` fails.
    pub fn subscribe<F>(
        &self,
        collection: &str,
        callback: SnapshotCallback,
        load: F,
    ) -> Result<ListenerRegistration, StoreError>
    where
        F: FnOnce() -> Result<Vec<Document>, StoreError>,
    {
        let _delivery = self.delivery.lock();
        let registration = self.register(collection, callback.clone());
        match load() {
            Ok(documents) => {
                callback(Ok(documents));
                Ok(registration)
            }
            Err(err) => {
                self.remove(registration);
                Err(err)
            }
        }
    }

    pub fn remove(&self, registration: ListenerRegistration) -> bool {
        let removed = self.listeners.lock().remove(&registration.id).is_some();
        if removed {
            log::debug!("Removed listener {}", registration.id);
        }
        removed
    }

    pub fn count(&self, collection: &str) -> usize {
        self.listeners
            .lock()
            .values()
            .filter(|listener| listener.collection == collection)
            .count()
    }

    /// Callbacks are cloned out so they run without the registry lock held;
    /// a callback may unsubscribe itself.
    fn callbacks_for(&self, collection: &str) -> Vec<SnapshotCallback> {
        self.listeners
            .lock()
            .values()
            .filter(|listener| listener.collection == collection)
            .map(|listener| listener.callback.clone())
            .collect()
    }

    /// Pushes the result of `load` to every listener of `collection`.
    /// `load` only runs when someone is listening.
    pub fn notify<F>(&self, collection: &str, load: F)
    where
        F: FnOnce() -> Result<Vec<Document>, StoreError>,
    {
        let _delivery = self.delivery.lock();
        let callbacks = self.callbacks_for(collection);
        if callbacks.is_empty() {
            return;
        }

        match load() {
            Ok(documents) => {
                for callback in callbacks {
                    callback(Ok(documents.clone()));
                }
            }
            Err(err) => {
                log::error!("Failed to load snapshot of `{collection}`: {err}");
                let err = Arc::new(err);
                for callback in callbacks {
                    callback(Err(err.clone()));
                }
            }
        }
    }
}
