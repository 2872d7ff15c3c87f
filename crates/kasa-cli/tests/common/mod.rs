use std::path::Path;
use std::process::{Command, Output};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Run the CLI binary against `api_url` with an isolated data directory.
pub fn run_cli(args: &[&str], data_dir: &Path, api_url: &str) -> Output {
    cli_command(args, data_dir, api_url)
        .output()
        .expect("Failed to execute CLI")
}

/// The CLI command with an isolated environment, not yet run.
pub fn cli_command(args: &[&str], data_dir: &Path, api_url: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kasa"));
    cmd.args(args);
    cmd.env("KASA_DATA_DIR", data_dir);
    cmd.env("KASA_API_URL", api_url);
    cmd.env_remove("KASA_PASSWORD");
    cmd.env_remove("KASA_TIMEOUT_SECS");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run the CLI off the async runtime so a mock server can answer it.
pub async fn run_cli_async(args: &[&str], data_dir: &Path, api_url: &str) -> Output {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let data_dir = data_dir.to_path_buf();
    let api_url = api_url.to_string();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_cli(&args, &data_dir, &api_url)
    })
    .await
    .expect("CLI task panicked")
}

/// Panic with stderr unless the command succeeded; return stdout.
pub fn assert_success(args: &[&str], output: &Output) -> String {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Mint an unsigned access token expiring `ttl_secs` from now.
pub fn jwt(user_id: i64, username: &str, ttl_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::json!({
        "user_id": user_id,
        "username": username,
        "exp": chrono::Utc::now().timestamp() + ttl_secs,
    });
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.sig", header, payload)
}

/// Write a credential file the way a previous `login` would have.
pub fn write_credentials(data_dir: &Path, access: &str, refresh: &str) {
    let body = serde_json::json!({ "token": access, "refreshToken": refresh });
    std::fs::write(data_dir.join("credentials.json"), body.to_string())
        .expect("Failed to write credentials");
}

/// Read the stored credential file, if any.
pub fn read_credentials(data_dir: &Path) -> Option<serde_json::Value> {
    let json = std::fs::read_to_string(data_dir.join("credentials.json")).ok()?;
    serde_json::from_str(&json).ok()
}
