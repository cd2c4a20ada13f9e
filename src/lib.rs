//! chat_feed: live, deduplicated and time-ordered chat feeds over a
//! document store.
//!
//! A [`feed::FeedListener`] subscribes to a store collection, the
//! [`feed::Aggregator`] turns every snapshot into the canonical message
//! sequence, and a [`session::ChatSession`] ties both to message submission
//! behind a single event loop.

pub mod auth;
pub mod common;
pub mod config;
pub mod error;
pub mod feed;
pub mod session;
pub mod storage;

pub use common::{ChatCommand, ChatEvent, MessageRecord, Timestamp};
pub use error::FeedError;
