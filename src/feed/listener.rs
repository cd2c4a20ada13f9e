use std::sync::Arc;

use tokio::sync::mpsc;

use crate::common::FeedEvent;
use crate::storage::{
    DocumentStore, ListenerRegistration, SnapshotCallback, SnapshotResult, StoreError,
};

/// Standing subscription to one collection of a document store.
///
/// The store may call back on any thread; deliveries are queued and handed
/// out one at a time through [`FeedListener::recv`], so the consumer applies
/// each snapshot fully before seeing the next.
pub struct FeedListener {
    store: Arc<dyn DocumentStore>,
    collection: String,
    registration: Option<ListenerRegistration>,
    events: mpsc::UnboundedReceiver<FeedEvent>,
}

impl FeedListener {
    pub fn subscribe(store: Arc<dyn DocumentStore>, collection: &str) -> Result<Self, StoreError> {
        let (event_sender, events) = mpsc::unbounded_channel();
        let label = collection.to_string();

        let callback: SnapshotCallback =
            Arc::new(move |result: SnapshotResult| {
                let event = match result {
                    Ok(documents) => FeedEvent::Snapshot(documents),
                    Err(err) => FeedEvent::Error(err),
                };
                if event_sender.send(event).is_err() {
                    log::warn!("Ignoring delivery for `{label}` after unsubscribe");
                }
            });

        let registration = store.subscribe(collection, callback)?;
        log::info!("Subscribed to collection `{collection}`");

        Ok(Self {
            store,
            collection: collection.to_string(),
            registration: Some(registration),
            events,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_active(&self) -> bool {
        self.registration.is_some()
    }

    /// Next delivery, or `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        if !self.is_active() {
            return None;
        }
        self.events.recv().await
    }

    /// Non-blocking variant of [`FeedListener::recv`].
    pub fn try_recv(&mut self) -> Option<FeedEvent> {
        if !self.is_active() {
            return None;
        }
        self.events.try_recv().ok()
    }

    /// Removes the store registration and discards anything still queued.
    /// Deliveries racing with the teardown are dropped by the callback.
    pub fn unsubscribe(&mut self) {
        let Some(registration) = self.registration.take() else {
            return;
        };

        if !self.store.remove_listener(registration) {
            log::debug!("Listener on `{}` was already removed", self.collection);
        }
        self.events.close();
        while self.events.try_recv().is_ok() {}
        log::info!("Unsubscribed from collection `{}`", self.collection);
    }
}

impl Drop for FeedListener {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::Map;

    #[tokio::test]
    async fn forwards_initial_snapshot_and_changes() {
        let store = Arc::new(MemoryStore::new());
        let mut listener = FeedListener::subscribe(store.clone(), "messages").expect("subscribe");

        assert!(matches!(listener.recv().await, Some(FeedEvent::Snapshot(docs)) if docs.is_empty()));

        store.submit("messages", Map::new()).expect("submit");
        assert!(matches!(listener.recv().await, Some(FeedEvent::Snapshot(docs)) if docs.len() == 1));
    }

    #[tokio::test]
    async fn forwards_store_errors() {
        let store = Arc::new(MemoryStore::new());
        let mut listener = FeedListener::subscribe(store.clone(), "messages").expect("subscribe");
        listener.try_recv();

        store.broadcast_error("messages", "quota exceeded");
        match listener.recv().await {
            Some(FeedEvent::Error(err)) => match err.as_ref() {
                StoreError::Unavailable(reason) => assert_eq!(reason, "quota exceeded"),
                other => panic!("unexpected error: {other}"),
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsubscribe_discards_queued_and_late_deliveries() {
        let store = Arc::new(MemoryStore::new());
        let mut listener = FeedListener::subscribe(store.clone(), "messages").expect("subscribe");
        assert_eq!(store.listener_count("messages"), 1);

        listener.unsubscribe();
        assert!(!listener.is_active());
        assert_eq!(store.listener_count("messages"), 0);

        store.submit("messages", Map::new()).expect("submit");
        assert!(listener.recv().await.is_none());
        assert!(listener.try_recv().is_none());

        // second teardown is harmless
        listener.unsubscribe();
    }

    #[test]
    fn dropping_the_listener_unsubscribes() {
        let store = Arc::new(MemoryStore::new());
        let listener = FeedListener::subscribe(store.clone(), "messages").expect("subscribe");
        drop(listener);
        assert_eq!(store.listener_count("messages"), 0);
    }
}
