//! Wallet subcommand implementations.

mod deposit;
mod reveal;
mod show;
mod transactions;
mod transfer;
mod withdraw;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::GlobalArgs;

#[derive(Args, Debug)]
pub struct WalletCommand {
    #[command(subcommand)]
    pub command: WalletSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum WalletSubcommand {
    /// Show the wallet
    Show(show::ShowArgs),

    /// List transaction history
    Transactions(transactions::TransactionsArgs),

    /// Add funds to the wallet
    Deposit(deposit::DepositArgs),

    /// Take funds out of the wallet
    Withdraw(withdraw::WithdrawArgs),

    /// Send funds to another user
    Transfer(transfer::TransferArgs),

    /// Reveal the balance (may charge a fee)
    Reveal(reveal::RevealArgs),
}

pub async fn handle(cmd: WalletCommand, global: &GlobalArgs) -> Result<()> {
    match cmd.command {
        WalletSubcommand::Show(args) => show::run(args, global).await,
        WalletSubcommand::Transactions(args) => transactions::run(args, global).await,
        WalletSubcommand::Deposit(args) => deposit::run(args, global).await,
        WalletSubcommand::Withdraw(args) => withdraw::run(args, global).await,
        WalletSubcommand::Transfer(args) => transfer::run(args, global).await,
        WalletSubcommand::Reveal(args) => reveal::run(args, global).await,
    }
}

/// Print the common wallet fields.
fn print_wallet(wallet: &kasa::api::Wallet) {
    crate::output::field("Owner", &wallet.username);
    crate::output::field("Balance", &format!("{} {}", wallet.balance, wallet.currency));
}
