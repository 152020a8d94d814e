//! Post-apply validation (§4.8), run before the watchdog's confirmation
//! window opens. Steps 1-3 failing trigger immediate auto-rollback with
//! no operator window; step 4 failing is a warning only.

use std::net::Ipv4Addr;
use std::time::Duration;

use netopt_common::clock;
use netopt_common::error::{NetoptError, Result};
use netopt_common::model::Plan;

const DEFAULT_CANARY_IP: &str = "1.1.1.1";
const DEFAULT_CANARY_NAME: &str = "example.com";

/// Run steps 1-3; a failure here is fatal (`ErrPostValidate`) and the
/// caller must auto-rollback with no operator window.
pub async fn validate_critical(plan: &Plan, first_gateway: Ipv4Addr) -> Result<()> {
    validate_routing_table(plan).await?;
    validate_gateway_reachable(first_gateway).await?;
    validate_canary_reachable(DEFAULT_CANARY_IP).await?;
    Ok(())
}

/// Run step 4 independently; a failure is a warning, never escalated.
/// Returns `Ok(false)` (not `Err`) when resolution fails or was skipped.
pub async fn validate_dns(dns_was_skipped: bool) -> bool {
    if dns_was_skipped {
        return true;
    }
    let result = clock::run(
        "getent",
        &["hosts", DEFAULT_CANARY_NAME],
        Duration::from_secs(3),
    )
    .await;
    matches!(result, Ok(out) if out.status_success)
}

async fn validate_routing_table(plan: &Plan) -> Result<()> {
    let output = clock::run_quick("ip", &["route", "show", "default"])
        .await
        .map_err(|e| NetoptError::PostValidate(format!("cannot read routing table: {e}")))?;

    for entry in &plan.entries {
        let nexthop = format!("dev {} weight {}", entry.link, entry.weight);
        if !output.stdout.contains(&nexthop) {
            return Err(NetoptError::PostValidate(format!(
                "routing table missing expected nexthop: {nexthop}"
            )));
        }
    }
    Ok(())
}

async fn validate_gateway_reachable(gateway: Ipv4Addr) -> Result<()> {
    let output = clock::run(
        "ping",
        &["-c", "1", "-W", "2", &gateway.to_string()],
        Duration::from_secs(2),
    )
    .await;
    match output {
        Ok(out) if out.status_success => Ok(()),
        _ => Err(NetoptError::PostValidate(format!(
            "plan gateway {gateway} unreachable after apply"
        ))),
    }
}

async fn validate_canary_reachable(canary: &str) -> Result<()> {
    let output = clock::run(
        "ping",
        &["-c", "1", "-W", "3", canary],
        Duration::from_secs(3),
    )
    .await;
    match output {
        Ok(out) if out.status_success => Ok(()),
        _ => Err(NetoptError::PostValidate(format!(
            "external canary {canary} unreachable after apply"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dns_validation_skips_when_dns_was_skipped() {
        assert!(validate_dns(true).await);
    }
}
