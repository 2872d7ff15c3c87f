//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;

use kasa::LoginCredentials;

use crate::cli::GlobalArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account username
    #[arg(long)]
    pub username: String,

    /// Account password
    #[arg(long, env = "KASA_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(args: LoginArgs, global: &GlobalArgs) -> Result<()> {
    let session = session::open(global).await?;
    let credentials = LoginCredentials::new(&args.username, &args.password);

    output::note("Logging in...");

    let identity = session
        .login(&credentials)
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    output::field("User", &identity.username);
    output::field("ID", identity.subject.as_str());
    output::field("API", &global.api_url);

    Ok(())
}
