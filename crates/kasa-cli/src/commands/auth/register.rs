//! Register command implementation.
//!
//! Creates the account only; run `kasa auth login` afterwards.

use anyhow::{Context, Result};
use clap::Args;

use kasa::Registration;

use crate::cli::GlobalArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Username for the new account
    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "KASA_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long, default_value = "")]
    pub first_name: String,

    #[arg(long, default_value = "")]
    pub last_name: String,
}

pub async fn run(args: RegisterArgs, global: &GlobalArgs) -> Result<()> {
    let session = session::open(global).await?;
    let registration = Registration {
        username: args.username,
        email: args.email,
        password: args.password,
        first_name: args.first_name,
        last_name: args.last_name,
    };

    let user = session
        .auth()
        .register(&registration)
        .await
        .context("Failed to register")?;

    output::field("User", &user.username);
    output::field("Email", &user.email);
    output::success("Account created successfully");

    Ok(())
}
