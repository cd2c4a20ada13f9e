use std::collections::HashMap;

use crate::common::{Document, FeedEvent, MessageRecord, RecordKey};
use crate::storage::StoreError;

/// Receives subscription errors. There is exactly one sink per aggregator.
pub trait ErrorSink: Send + Sync {
    fn report(&mut self, error: &StoreError);
}

/// Default sink: writes the error to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&mut self, error: &StoreError) {
        log::error!("Message feed error: {error}");
    }
}

/// Result of turning one raw snapshot into the display sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Deduplicated records in ascending timestamp order.
    pub messages: Vec<MessageRecord>,
    /// Documents that could not be decoded.
    pub dropped: usize,
    /// Documents collapsed into an earlier one with the same key.
    pub duplicates: usize,
}

/// Deduplicates and orders a snapshot.
///
/// Records are keyed by their store id, falling back to the client
/// identifier. A later document with an already seen key replaces the
/// earlier one. Records carrying neither get a fresh identity and are
/// never merged. The result is sorted by timestamp, ties broken by key;
/// keyless records keep their snapshot order among equal timestamps.
pub fn aggregate(documents: &[Document]) -> Aggregation {
    let mut messages: Vec<MessageRecord> = Vec::with_capacity(documents.len());
    let mut positions: HashMap<RecordKey, usize> = HashMap::with_capacity(documents.len());
    let mut dropped = 0;
    let mut duplicates = 0;

    for document in documents {
        let record = match MessageRecord::from_document(document) {
            Ok(record) => record,
            Err(err) => {
                dropped += 1;
                log::debug!(
                    "Dropping malformed document {}: {err}",
                    document.id.as_deref().unwrap_or("<unsaved>")
                );
                continue;
            }
        };

        match record.record_key() {
            Some(key) => match positions.get(&key) {
                Some(&index) => {
                    duplicates += 1;
                    messages[index] = record;
                }
                None => {
                    positions.insert(key, messages.len());
                    messages.push(record);
                }
            },
            None => messages.push(record),
        }
    }

    messages.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.stable_key().cmp(&b.stable_key()))
    });

    Aggregation {
        messages,
        dropped,
        duplicates,
    }
}

/// Owns the canonical chat sequence and replaces it on every snapshot.
pub struct Aggregator {
    chats: Vec<MessageRecord>,
    sink: Box<dyn ErrorSink>,
    last_error: Option<String>,
    dropped_total: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::with_sink(Box::new(LogSink))
    }

    pub fn with_sink(sink: Box<dyn ErrorSink>) -> Self {
        Self {
            chats: Vec::new(),
            sink,
            last_error: None,
            dropped_total: 0,
        }
    }

    pub fn chats(&self) -> &[MessageRecord] {
        &self.chats
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Malformed documents seen across all snapshots so far.
    pub fn dropped_total(&self) -> usize {
        self.dropped_total
    }

    pub fn apply_snapshot(&mut self, documents: &[Document]) -> &[MessageRecord] {
        let aggregation = aggregate(documents);
        if aggregation.dropped > 0 {
            log::warn!(
                "Dropped {} malformed message record(s) from snapshot",
                aggregation.dropped
            );
        }
        log::debug!(
            "Applied snapshot: {} documents, {} messages, {} duplicates",
            documents.len(),
            aggregation.messages.len(),
            aggregation.duplicates
        );

        self.dropped_total += aggregation.dropped;
        self.last_error = None;
        self.chats = aggregation.messages;
        &self.chats
    }

    /// Reports the error; the current sequence stays as it was.
    pub fn apply_error(&mut self, error: &StoreError) {
        self.sink.report(error);
        self.last_error = Some(error.to_string());
    }

    /// Applies one feed delivery. Returns the new sequence for snapshots.
    pub fn apply(&mut self, event: &FeedEvent) -> Option<&[MessageRecord]> {
        match event {
            FeedEvent::Snapshot(documents) => Some(self.apply_snapshot(documents)),
            FeedEvent::Error(error) => {
                self.apply_error(error);
                None
            }
        }
    }
}
