pub mod client;
pub mod state;

pub use client::{CHANNEL_CAPACITY, ChatSession, SessionHandle, SubmitReceipt, spawn};
pub use state::ChatViewState;
