pub mod commands;
pub mod events;
pub mod types;

pub use commands::ChatCommand;
pub use events::{ChatEvent, FeedEvent};
pub use types::{Document, MalformedRecord, MessageDraft, MessageRecord, RecordKey, Timestamp};
