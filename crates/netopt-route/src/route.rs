//! `backup`/`apply`/`restore` for the single multipath default route
//! (§4.6). Every mutation goes through [`netopt_common::clock::run_quick`]
//! so it is argv-vector execution end to end — no shell string is ever
//! composed, which is what keeps `restore` safe against a corrupted
//! backup file (§4.6's command-injection note).

use netopt_common::clock::run_quick;
use netopt_common::error::{NetoptError, Result};
use netopt_common::model::{Plan, RouteBackup, RouteBackupEntry};

/// Default-route clause keywords `restore` is willing to replay. Anything
/// outside this set causes the entry to be skipped rather than executed.
const ALLOWED_TOKENS: &[&str] = &["via", "dev", "scope", "proto", "metric", "src"];

const MAX_CLEAR_ITERATIONS: u32 = 10;

/// Capture the current default-route spec(s) as raw `ip route show`
/// lines, one per nexthop clause.
pub async fn backup() -> Result<RouteBackup> {
    let output = run_quick("ip", &["route", "show", "default"])
        .await
        .map_err(|e| NetoptError::Other(format!("failed to read default route: {e}")))?;

    let entries = output
        .stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| RouteBackupEntry { raw: l.trim().to_string() })
        .collect();

    Ok(RouteBackup {
        captured_at_utc: chrono::Utc::now().to_rfc3339(),
        entries,
    })
}

/// Idempotently remove every existing default route. Repeats up to
/// [`MAX_CLEAR_ITERATIONS`] times; failure to converge surfaces
/// `ErrCannotClear`.
async fn clear_default_routes() -> Result<()> {
    for _ in 0..MAX_CLEAR_ITERATIONS {
        let still_present = run_quick("ip", &["route", "show", "default"])
            .await
            .map(|out| !out.stdout.trim().is_empty())
            .unwrap_or(false);
        if !still_present {
            return Ok(());
        }
        // Deletion failing here is expected once the last route is gone
        // out from under a racing reader; only a non-convergence after
        // MAX_CLEAR_ITERATIONS is an error.
        let _ = run_quick("ip", &["route", "del", "default"]).await;
    }

    let still_present = run_quick("ip", &["route", "show", "default"])
        .await
        .map(|out| !out.stdout.trim().is_empty())
        .unwrap_or(true);
    if still_present {
        return Err(NetoptError::CannotClear(format!(
            "default route still present after {MAX_CLEAR_ITERATIONS} clear attempts"
        )));
    }
    Ok(())
}

/// Install `plan` as a single multipath default route. Must be called
/// inside an open transaction — on failure, the caller is responsible for
/// invoking `restore` with the pre-apply backup (the transaction layer
/// does this; see `netopt-safety`).
pub async fn apply(plan: &Plan) -> Result<()> {
    if plan.is_empty() {
        return Err(NetoptError::ApplyFailed(
            "refusing to apply an empty plan".to_string(),
        ));
    }

    clear_default_routes().await?;

    let mut args: Vec<String> = vec!["route".to_string(), "replace".to_string(), "default".to_string()];
    for entry in &plan.entries {
        args.push("nexthop".to_string());
        args.push("via".to_string());
        args.push(entry.gateway.to_string());
        args.push("dev".to_string());
        args.push(entry.link.clone());
        args.push("weight".to_string());
        args.push(entry.weight.to_string());
    }
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = run_quick("ip", &arg_refs).await?;
    if !output.status_success {
        return Err(NetoptError::ApplyFailed(output.stderr));
    }
    Ok(())
}

/// Reinstate a previously captured [`RouteBackup`]. Clears current
/// default routes, then replays each backed-up entry after whitelist
/// validation; entries that fail validation are skipped and logged, never
/// executed.
pub async fn restore(backup: &RouteBackup) -> Result<()> {
    clear_default_routes().await?;

    if backup.is_empty() {
        return Ok(());
    }

    for entry in &backup.entries {
        match validate_route_clause(&entry.raw) {
            Some(tokens) => {
                let mut args = vec!["route", "add"];
                args.extend(tokens.iter().map(String::as_str));
                let output = run_quick("ip", &args).await?;
                if !output.status_success {
                    tracing::warn!(clause = %entry.raw, stderr = %output.stderr, "restore clause failed");
                }
            }
            None => {
                tracing::warn!(clause = %entry.raw, "skipping malformed route-backup entry");
            }
        }
    }
    Ok(())
}

/// Validate that `raw` is a well-formed default-route clause: starts with
/// `default`, followed by `(keyword, value)` pairs whose keywords are all
/// in [`ALLOWED_TOKENS`]. Returns the tokenized clause on success.
fn validate_route_clause(raw: &str) -> Option<Vec<String>> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.first() != Some(&"default") {
        return None;
    }
    let rest = &tokens[1..];
    if rest.len() % 2 != 0 {
        return None;
    }
    for pair in rest.chunks(2) {
        let keyword = pair[0];
        if !ALLOWED_TOKENS.contains(&keyword) {
            return None;
        }
    }
    Some(tokens.into_iter().map(String::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_well_formed_clause() {
        let tokens =
            validate_route_clause("default via 192.168.1.1 dev eth0 proto static metric 100")
                .unwrap();
        assert_eq!(tokens[0], "default");
    }

    #[test]
    fn rejects_clause_without_default_prefix() {
        assert!(validate_route_clause("via 192.168.1.1 dev eth0").is_none());
    }

    #[test]
    fn rejects_clause_with_disallowed_keyword() {
        assert!(validate_route_clause("default via 1.1.1.1; rm -rf / dev eth0").is_none());
    }

    #[test]
    fn rejects_odd_token_count() {
        assert!(validate_route_clause("default via 1.1.1.1 dev").is_none());
    }
}
