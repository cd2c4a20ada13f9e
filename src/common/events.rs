use std::sync::Arc;

use crate::common::types::{Document, MessageRecord};
use crate::storage::StoreError;

/// What a feed subscription delivers to its consumer.
#[derive(Debug)]
pub enum FeedEvent {
    /// Full current contents of the collection, unordered.
    Snapshot(Vec<Document>),
    Error(Arc<StoreError>),
}

/// Events the chat session publishes to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The canonical ordered feed after a snapshot was applied.
    ChatsUpdated(Vec<MessageRecord>),
    /// The store accepted a submission; the composer may be cleared.
    SubmitConfirmed {
        identifier: String,
        document_id: String,
    },
    /// The submission was rejected; `body` is handed back for a retry.
    SubmitFailed { body: String, reason: String },
    /// The subscription reported an error; the last feed stays valid.
    FeedError(String),
    SignedOut,
}
