use thiserror::Error;

use crate::auth::NonceError;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no user is signed in")]
    NotAuthenticated,
    #[error("message body is empty")]
    EmptyMessage,
    #[error("chat session is closed")]
    SessionClosed,
    #[error(transparent)]
    Nonce(#[from] NonceError),
}
