//! `netopt restore` (§4.6): reinstate a route backup without requiring a
//! live in-process [`netopt_safety::Transaction`] — this is the emergency
//! path an operator (or the watchdog's own rollback script, via
//! `--backup-file`) reaches for when `apply` is not the thing that's
//! currently running.

use netopt_common::config::Config;
use netopt_common::error::{NetoptError, Result};

use crate::cli::RestoreArgs;
use crate::config_paths;

pub async fn run(config: &Config, args: &RestoreArgs) -> Result<i32> {
    let path = args
        .backup_file
        .clone()
        .unwrap_or_else(|| config_paths::route_backup_path(&config.state_root));

    let text = std::fs::read_to_string(&path).map_err(NetoptError::Io)?;
    let backup: netopt_common::model::RouteBackup = serde_json::from_str(&text)
        .map_err(|e| NetoptError::Other(format!("route backup at {} is not valid: {e}", path.display())))?;

    tracing::info!(reason = %args.reason, path = %path.display(), "restoring route backup");
    netopt_route::restore(&backup).await?;

    println!("restored {} route clause(s) from {}", backup.entries.len(), path.display());
    Ok(0)
}
