//! Whoami command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::GlobalArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct WhoamiArgs {}

pub async fn run(_args: WhoamiArgs, global: &GlobalArgs) -> Result<()> {
    let session = session::require(global).await?;
    let identity = session.identity().context("Session has no identity")?;

    output::field("User", &identity.username);
    output::field("ID", identity.subject.as_str());

    Ok(())
}
