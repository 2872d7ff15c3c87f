//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::auth::AuthCommand;
use crate::commands::wallet::WalletCommand;

/// Command-line client for the kasa wallet API.
#[derive(Parser, Debug)]
#[command(name = "kasa")]
#[command(author, version = env!("KASA_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options every command needs to reach the API and the stored session.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Wallet API base URL
    #[arg(
        long,
        global = true,
        env = "KASA_API_URL",
        default_value = kasa::types::DEFAULT_API_URL
    )]
    pub api_url: String,

    /// Directory holding the stored credentials
    #[arg(long, global = true, env = "KASA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in, sign out and account management
    Auth(AuthCommand),

    /// Wallet and transaction operations
    Wallet(WalletCommand),
}
