//! Withdraw command implementation.

use anyhow::{Context, Result};
use clap::Args;

use kasa::Amount;

use crate::cli::GlobalArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct WithdrawArgs {
    /// Amount, e.g. 25.00
    pub amount: String,
}

pub async fn run(args: WithdrawArgs, global: &GlobalArgs) -> Result<()> {
    let amount = Amount::new(&args.amount).context("Invalid amount")?;
    let session = session::require(global).await?;

    let wallet = session
        .wallet()
        .withdraw(&amount)
        .await
        .context("Failed to withdraw")?;

    output::success(&format!("Withdrew {}", amount));
    super::print_wallet(&wallet);

    Ok(())
}
