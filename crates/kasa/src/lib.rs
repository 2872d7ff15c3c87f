//! kasa - Wallet API client
//!
//! This library talks to the wallet API on behalf of one signed-in user.
//! All authenticated calls flow through a [`Session`], which keeps the
//! credential pair in a [`CredentialStore`], renews it when the API
//! rejects an expired access token, and replays the rejected call once.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kasa::{Amount, ClientConfig, LoginCredentials, MemoryStore, Session};
//!
//! # async fn example() -> Result<(), kasa::Error> {
//! let session = Session::new(&ClientConfig::from_env()?, Arc::new(MemoryStore::new()))?;
//! session.login(&LoginCredentials::new("alice", "hunter22")).await?;
//!
//! let wallet = session.wallet();
//! wallet.deposit(&Amount::new("25.00")?).await?;
//! println!("balance: {}", wallet.wallet().await?.balance);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

// Re-export primary types at crate root for convenience
pub use api::{AuthClient, RequestPipeline, WalletApi};
pub use auth::{CredentialPair, Identity, LoginCredentials, Registration, Session, SessionState};
pub use config::ClientConfig;
pub use error::Error;
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use types::{Amount, ApiUrl};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
