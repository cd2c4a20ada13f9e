use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{
    Document, DocumentStore, ListenerRegistration, ListenerRegistry, SnapshotCallback, StoreError,
};

/// In-process document store. Used as the fake store in tests and for
/// ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    listeners: ListenerRegistry,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every submission fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Stores a document as-is (no validation) and notifies listeners.
    pub fn insert(&self, collection: &str, document: Document) {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(document);
        self.notify(collection);
    }

    /// Pushes an arbitrary snapshot to the listeners without touching the
    /// stored contents, e.g. an overlapping redelivery.
    pub fn deliver_raw(&self, collection: &str, documents: Vec<Document>) {
        self.listeners.notify(collection, || Ok(documents));
    }

    pub fn broadcast_error(&self, collection: &str, message: &str) {
        self.listeners
            .notify(collection, || Err(StoreError::Unavailable(message.to_string())));
    }

    pub fn listener_count(&self, collection: &str) -> usize {
        self.listeners.count(collection)
    }

    fn load(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn notify(&self, collection: &str) {
        self.listeners.notify(collection, || Ok(self.load(collection)));
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe(
        &self,
        collection: &str,
        callback: SnapshotCallback,
    ) -> Result<ListenerRegistration, StoreError> {
        self.listeners
            .subscribe(collection, callback, || Ok(self.load(collection)))
    }

    fn remove_listener(&self, registration: ListenerRegistration) -> bool {
        self.listeners.remove(registration)
    }

    fn submit(&self, collection: &str, fields: Map<String, Value>) -> Result<String, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        self.insert(collection, Document::new(Some(id.clone()), fields));
        Ok(id)
    }

    fn snapshot(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.load(collection))
    }
}
