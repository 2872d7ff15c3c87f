//! Transaction history command implementation.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;

use kasa::api::TransactionFilter;

use crate::cli::GlobalArgs;
use crate::output;
use crate::session;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Kind {
    Deposit,
    Withdraw,
    Transfer,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Deposit => "deposit",
            Kind::Withdraw => "withdraw",
            Kind::Transfer => "transfer",
        }
    }
}

#[derive(Args, Debug)]
pub struct TransactionsArgs {
    /// Only this kind of transaction
    #[arg(long, value_enum)]
    pub kind: Option<Kind>,

    /// Earliest date, YYYY-MM-DD
    #[arg(long)]
    pub from: Option<chrono::NaiveDate>,

    /// Latest date, YYYY-MM-DD
    #[arg(long)]
    pub to: Option<chrono::NaiveDate>,

    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Print the raw JSON response
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: TransactionsArgs, global: &GlobalArgs) -> Result<()> {
    let session = session::require(global).await?;

    let filter = TransactionFilter {
        transaction_type: args.kind.map(|k| k.as_str().to_string()),
        start_date: args.from.map(|d| d.to_string()),
        end_date: args.to.map(|d| d.to_string()),
    };

    let page = session
        .wallet()
        .transactions(&filter, args.page)
        .await
        .context("Failed to list transactions")?;

    if args.json {
        return output::json_pretty(&page);
    }

    if page.results.is_empty() {
        output::note("No transactions found.");
        return Ok(());
    }

    for tx in &page.results {
        println!(
            "{}  {:<8}  {:>12}  {}  {}",
            tx.created_at.format("%Y-%m-%d %H:%M"),
            tx.transaction_type,
            tx.amount,
            tx.counterparty.as_deref().unwrap_or("-"),
            tx.status.dimmed()
        );
    }

    if page.next.is_some() {
        eprintln!();
        eprintln!("{}: {}", "Next page".dimmed(), args.page + 1);
    }

    Ok(())
}
