//! Endpoint paths and request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::CredentialPair;

// ============================================================================
// Endpoint Paths
// ============================================================================

pub const WALLET: &str = "wallet/";
pub const DEPOSIT: &str = "wallet/deposit/";
pub const WITHDRAW: &str = "wallet/withdraw/";
pub const TRANSFER: &str = "wallet/transfer/";
pub const REVEAL_BALANCE: &str = "wallet/reveal-balance/";
pub const TRANSACTIONS: &str = "transactions/";

// ============================================================================
// Authentication
// ============================================================================

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response from the login and renewal endpoints.
///
/// Servers that do not rotate refresh tokens omit `refresh` on renewal.
#[derive(Deserialize)]
pub(crate) struct TokenPairResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl TokenPairResponse {
    /// Pair the new access token with the rotated refresh token, or with
    /// `presented` when the server did not rotate it.
    pub(crate) fn into_pair(self, presented: Option<&str>) -> Option<CredentialPair> {
        let refresh = self.refresh.or_else(|| presented.map(str::to_string))?;
        Some(CredentialPair::new(self.access, refresh))
    }
}

#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// Account returned by the registration endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

// ============================================================================
// Wallet
// ============================================================================

/// The signed-in user's wallet.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Wallet {
    pub id: i64,
    pub user: i64,
    pub username: String,
    /// Decimal string, e.g. `"150.00"`.
    pub balance: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub(crate) struct AmountRequest<'a> {
    pub amount: &'a str,
}

#[derive(Serialize)]
pub(crate) struct TransferRequest<'a> {
    pub recipient_username: &'a str,
    pub amount: &'a str,
}

/// Confirmation returned by a successful transfer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferReceipt {
    #[serde(rename = "success")]
    pub message: String,
}

/// Result of a balance reveal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalanceReveal {
    pub balance: String,
    pub free_reveals_left: u32,
    pub fee_deducted: bool,
}

// ============================================================================
// Transactions
// ============================================================================

/// A single wallet transaction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub wallet: i64,
    pub transaction_type: String,
    pub amount: String,
    #[serde(default)]
    pub counterparty: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// One page of transaction history.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionPage {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<Transaction>,
}

/// Optional filters for transaction history.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// `deposit`, `withdraw` or `transfer`.
    pub transaction_type: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub end_date: Option<String>,
}
