pub mod identity;
pub mod nonce;

pub use identity::{IdentityProvider, StaticIdentity, UserProfile};
pub use nonce::{NonceError, generate_nonce, sha256_hex};
