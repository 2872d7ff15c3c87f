//! Reveal balance command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::GlobalArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RevealArgs {}

pub async fn run(_args: RevealArgs, global: &GlobalArgs) -> Result<()> {
    let session = session::require(global).await?;

    let reveal = session
        .wallet()
        .reveal_balance()
        .await
        .context("Failed to reveal balance")?;

    output::field("Balance", &reveal.balance);
    output::field("Free reveals left", &reveal.free_reveals_left.to_string());
    if reveal.fee_deducted {
        output::note("A reveal fee was deducted.");
    }

    Ok(())
}
