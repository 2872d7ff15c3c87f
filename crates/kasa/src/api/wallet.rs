//! Wallet operations over the authenticated pipeline.

use tracing::{debug, instrument};

use crate::Result;
use crate::types::Amount;

use super::endpoints::{
    AmountRequest, BalanceReveal, DEPOSIT, REVEAL_BALANCE, TRANSACTIONS, TRANSFER,
    TransactionFilter, TransactionPage, TransferReceipt, TransferRequest, WALLET, WITHDRAW,
    Wallet,
};
use super::pipeline::RequestPipeline;

/// Typed access to the wallet endpoints.
///
/// Every call goes through the [`RequestPipeline`], so an expired token
/// is renewed and the call replayed transparently.
#[derive(Debug, Clone)]
pub struct WalletApi {
    pipeline: RequestPipeline,
}

impl WalletApi {
    pub fn new(pipeline: RequestPipeline) -> Self {
        Self { pipeline }
    }

    /// Fetch the signed-in user's wallet.
    #[instrument(skip(self))]
    pub async fn wallet(&self) -> Result<Wallet> {
        self.pipeline.get(WALLET, &[]).await
    }

    /// Fetch one page (1-based) of transaction history.
    #[instrument(skip(self))]
    pub async fn transactions(
        &self,
        filter: &TransactionFilter,
        page: u32,
    ) -> Result<TransactionPage> {
        let mut query = vec![("page", page.max(1).to_string())];
        if let Some(ref kind) = filter.transaction_type {
            query.push(("transaction_type", kind.clone()));
        }
        if let Some(ref start) = filter.start_date {
            query.push(("start_date", start.clone()));
        }
        if let Some(ref end) = filter.end_date {
            query.push(("end_date", end.clone()));
        }

        let page: TransactionPage = self.pipeline.get(TRANSACTIONS, &query).await?;
        debug!(count = page.count, returned = page.results.len(), "Fetched transactions");
        Ok(page)
    }

    #[instrument(skip(self, amount), fields(%amount))]
    pub async fn deposit(&self, amount: &Amount) -> Result<Wallet> {
        let request = AmountRequest {
            amount: amount.as_str(),
        };
        self.pipeline.post(DEPOSIT, &request).await
    }

    #[instrument(skip(self, amount), fields(%amount))]
    pub async fn withdraw(&self, amount: &Amount) -> Result<Wallet> {
        let request = AmountRequest {
            amount: amount.as_str(),
        };
        self.pipeline.post(WITHDRAW, &request).await
    }

    /// Send `amount` to another user by username.
    #[instrument(skip(self, recipient, amount), fields(%recipient, %amount))]
    pub async fn transfer(&self, recipient: &str, amount: &Amount) -> Result<TransferReceipt> {
        let request = TransferRequest {
            recipient_username: recipient,
            amount: amount.as_str(),
        };
        self.pipeline.post(TRANSFER, &request).await
    }

    /// Reveal the balance; the server may charge a fee past the daily free quota.
    #[instrument(skip(self))]
    pub async fn reveal_balance(&self) -> Result<BalanceReveal> {
        self.pipeline.post_empty(REVEAL_BALANCE).await
    }
}
