//! Stored session handling for the CLI.
//!
//! Every invocation is a fresh process, so each command rebuilds the
//! library session from the credential file and restores it.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;

use kasa::{ApiUrl, ClientConfig, FileStore, Session};

use crate::cli::GlobalArgs;

const CREDENTIALS_FILE: &str = "credentials.json";

/// Get the credential file path, creating its directory.
pub fn credentials_path(global: &GlobalArgs) -> Result<PathBuf> {
    let data_dir = match &global.data_dir {
        Some(dir) => dir.clone(),
        None => ProjectDirs::from("", "", "kasa")
            .context("Could not determine data directory")?
            .data_dir()
            .to_path_buf(),
    };

    fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    let path = data_dir.join(CREDENTIALS_FILE);
    tracing::debug!(path = %path.display(), "Using credential file");
    Ok(path)
}

/// Environment settings (timeout) with the `--api-url` flag on top.
fn client_config(global: &GlobalArgs) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
    config.api_url = ApiUrl::new(&global.api_url).context("Invalid API URL")?;
    Ok(config)
}

/// Build a session against the configured API and restore stored credentials.
pub async fn open(global: &GlobalArgs) -> Result<Session> {
    let store = Arc::new(FileStore::new(credentials_path(global)?));
    let session = Session::new(&client_config(global)?, store)?;

    session
        .restore_from_storage()
        .await
        .context("Failed to restore session")?;

    Ok(session)
}

/// Like [`open`], but fails unless a session was restored.
pub async fn require(global: &GlobalArgs) -> Result<Session> {
    let session = open(global).await?;
    if !session.is_authenticated() {
        bail!("Not logged in. Run 'kasa auth login' first.");
    }
    Ok(session)
}
