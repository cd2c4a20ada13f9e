//! Document stores the chat feed reads from and writes to.
//!
//! A store keeps named collections of JSON documents and pushes the full
//! contents of a collection to every registered listener after each change.

pub mod listeners;
pub mod memory;
pub mod sqlite;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

pub use crate::common::types::Document;
pub use listeners::{ListenerRegistration, ListenerRegistry};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// What a store hands to its listeners. One error value is shared by every
/// listener of the collection.
pub type SnapshotResult = Result<Vec<Document>, Arc<StoreError>>;

/// Invoked with the full collection (or an error) on every change.
///
/// May run on any thread; implementations must not block or write to the
/// store that is calling them.
pub type SnapshotCallback = Arc<dyn Fn(SnapshotResult) + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait DocumentStore: Send + Sync {
    /// Registers `callback` for `collection` and immediately delivers the
    /// current contents to it.
    fn subscribe(
        &self,
        collection: &str,
        callback: SnapshotCallback,
    ) -> Result<ListenerRegistration, StoreError>;

    /// Returns false if the registration was already removed.
    fn remove_listener(&self, registration: ListenerRegistration) -> bool;

    /// Writes a new document and returns its store-assigned id.
    fn submit(&self, collection: &str, fields: Map<String, Value>) -> Result<String, StoreError>;

    fn snapshot(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

/// Ensure the parent directory of a file exists
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
