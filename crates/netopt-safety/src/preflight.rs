//! Pre-flight checks (§4.8): run before `apply`, abort with `ErrPreflight`
//! and no mutation on any failure.

use std::time::Duration;

use netopt_common::clock;
use netopt_common::error::{NetoptError, Result};
use netopt_common::model::Link;

/// Tools `apply` depends on somewhere in its pipeline.
const REQUIRED_TOOLS: &[&str] = &["ip", "ping", "sysctl"];

/// Run every pre-flight check. Returns the first failure as
/// `ErrPreflight`; callers should treat any `Err` as "abort, no mutation
/// occurred."
pub async fn run(links: &[Link], default_gateway: Option<std::net::Ipv4Addr>) -> Result<()> {
    check_admin_up_link(links)?;
    check_tools_present()?;
    if let Some(gateway) = default_gateway {
        check_gateway_reachable(gateway).await?;
    }
    Ok(())
}

fn check_admin_up_link(links: &[Link]) -> Result<()> {
    if links.iter().any(|l| l.admin_up) {
        Ok(())
    } else {
        Err(NetoptError::Preflight(
            "no admin-up link available".to_string(),
        ))
    }
}

fn check_tools_present() -> Result<()> {
    for tool in REQUIRED_TOOLS {
        let found = std::process::Command::new("which")
            .arg(tool)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !found {
            return Err(NetoptError::Preflight(format!("required tool missing: {tool}")));
        }
    }
    Ok(())
}

async fn check_gateway_reachable(gateway: std::net::Ipv4Addr) -> Result<()> {
    let output = clock::run(
        "ping",
        &["-c", "1", "-W", "2", &gateway.to_string()],
        Duration::from_secs(2),
    )
    .await;
    match output {
        Ok(out) if out.status_success => Ok(()),
        _ => Err(NetoptError::Preflight(format!(
            "default gateway {gateway} is not reachable"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netopt_common::model::LinkClass;

    fn link(admin_up: bool) -> Link {
        Link {
            name: "eth0".to_string(),
            class: LinkClass::Ethernet,
            admin_up,
            carrier: true,
            mac: None,
            mtu: None,
            speed_mbps: None,
        }
    }

    #[test]
    fn fails_when_no_link_is_admin_up() {
        let links = vec![link(false)];
        assert!(check_admin_up_link(&links).is_err());
    }

    #[test]
    fn passes_when_any_link_is_admin_up() {
        let links = vec![link(false), link(true)];
        assert!(check_admin_up_link(&links).is_ok());
    }
}
