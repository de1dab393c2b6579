//! Check command - test both stores

use anyhow::{bail, Result};
use clap::Args;
use serde_json::json;

use super::{local_store, remote_store, CliContext};

/// Test the connection to the server and the local root
#[derive(Debug, Args)]
pub struct CheckCommand {}

impl CheckCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_valid_config()?;

        let remote = remote_store(&config)?;
        let local = local_store(&config);

        let remote_ok = remote.is_valid_connection().await;
        let local_ok = local.is_valid_connection().await;

        let remote_target = format!(
            "{}{}",
            config.remote.base_url(),
            config.remote.root_path().unwrap_or_default()
        );
        let local_target = config.sync.root_dir().display().to_string();

        formatter.print_json(&json!({
            "remote": { "target": remote_target, "ok": remote_ok },
            "local": { "target": local_target, "ok": local_ok },
        }));

        for (label, target, ok) in [
            ("Remote", &remote_target, remote_ok),
            ("Local", &local_target, local_ok),
        ] {
            if ok {
                formatter.success(&format!("{label}: {target}"));
            } else {
                formatter.error(&format!("{label}: {target} is not reachable"));
            }
        }

        if !remote_ok {
            bail!("Invalid credentials");
        }
        if !local_ok {
            bail!("Local root {local_target} is not a directory");
        }
        Ok(())
    }
}
