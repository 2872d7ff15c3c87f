//! Transfer command implementation.

use anyhow::{Context, Result};
use clap::Args;

use kasa::Amount;

use crate::cli::GlobalArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Recipient username
    #[arg(long)]
    pub to: String,

    /// Amount, e.g. 10.00
    pub amount: String,
}

pub async fn run(args: TransferArgs, global: &GlobalArgs) -> Result<()> {
    let amount = Amount::new(&args.amount).context("Invalid amount")?;
    let session = session::require(global).await?;

    let receipt = session
        .wallet()
        .transfer(&args.to, &amount)
        .await
        .context("Failed to transfer")?;

    output::success(&receipt.message);

    Ok(())
}
