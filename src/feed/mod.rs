//! Live message feed: subscription to a store collection and the
//! aggregation of its snapshots into a display-ready sequence.

pub mod aggregator;
pub mod listener;

pub use aggregator::{Aggregation, Aggregator, ErrorSink, LogSink, aggregate};
pub use listener::FeedListener;
