//! Show wallet command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::GlobalArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Print the raw JSON response
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ShowArgs, global: &GlobalArgs) -> Result<()> {
    let session = session::require(global).await?;

    let wallet = session
        .wallet()
        .wallet()
        .await
        .context("Failed to fetch wallet")?;

    if args.json {
        return output::json_pretty(&wallet);
    }

    super::print_wallet(&wallet);
    output::field("Opened", &wallet.created_at.format("%Y-%m-%d").to_string());

    Ok(())
}
