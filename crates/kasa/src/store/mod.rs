//! Persisted credential storage.
//!
//! The store is a plain key-value holder for the current credential pair.
//! It performs no validation; every `save` or `clear` is visible to the
//! next `load` in the same process.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;

use crate::Result;
use crate::auth::CredentialPair;

/// Key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage for the current credential pair.
///
/// Operations are synchronous: reading and writing the store is never a
/// suspension point. A store missing either key holds no session.
pub trait CredentialStore: Send + Sync + fmt::Debug {
    /// Load the stored pair, or `None` if no session is stored.
    fn load(&self) -> Result<Option<CredentialPair>>;

    /// Replace the stored pair with `pair`, both keys at once.
    fn save(&self, pair: &CredentialPair) -> Result<()>;

    /// Remove both keys. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

/// Build a pair from the two raw key values, if both are present.
fn pair_from_values(access: Option<&String>, refresh: Option<&String>) -> Option<CredentialPair> {
    match (access, refresh) {
        (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
        _ => None,
    }
}
