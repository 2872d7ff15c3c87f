//! Wallet API client.
//!
//! [`ApiClient`] is the bare transport. [`AuthClient`] uses it directly for
//! the token endpoints; everything else goes through the
//! [`RequestPipeline`], which attaches and renews credentials.

mod auth;
mod client;
mod endpoints;
mod pipeline;
mod wallet;

pub use auth::AuthClient;
pub use client::{ApiClient, ApiRequest};
pub use endpoints::{
    BalanceReveal, RegisteredUser, Transaction, TransactionFilter, TransactionPage,
    TransferReceipt, Wallet,
};
pub use pipeline::RequestPipeline;
pub use wallet::WalletApi;
