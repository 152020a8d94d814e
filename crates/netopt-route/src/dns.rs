//! `configure_dns`: write `/etc/resolv.conf` only when it is safe to do
//! so — never if it's a symlink (system-managed) or a local resolver
//! (`dnsmasq`) already governs it (§4.6).

use std::path::Path;

use netopt_common::model::DnsBackup;

const RESOLV_CONF: &str = "/etc/resolv.conf";

/// Write `servers` into `/etc/resolv.conf`, skipping if the file is a
/// symlink or `dnsmasq` is running locally. Returns the prior contents (to
/// restore later) or the reason the write was skipped.
pub fn configure_dns(servers: &[String]) -> DnsBackup {
    configure_dns_at(Path::new(RESOLV_CONF), servers)
}

fn configure_dns_at(path: &Path, servers: &[String]) -> DnsBackup {
    if servers.is_empty() {
        return DnsBackup::Skipped {
            reason: "no DNS_SERVERS configured".to_string(),
        };
    }

    if is_symlink(path) {
        return DnsBackup::Skipped {
            reason: format!("{} is a symlink, managed by the system", path.display()),
        };
    }

    if dnsmasq_active() {
        return DnsBackup::Skipped {
            reason: "dnsmasq is active on this host".to_string(),
        };
    }

    let prior_contents = std::fs::read_to_string(path).unwrap_or_default();

    let mut body = String::new();
    for server in servers {
        body.push_str("nameserver ");
        body.push_str(server);
        body.push('\n');
    }

    match std::fs::write(path, &body) {
        Ok(()) => DnsBackup::Replaced { prior_contents },
        Err(e) => DnsBackup::Skipped {
            reason: format!("failed to write {}: {e}", path.display()),
        },
    }
}

/// Restore `/etc/resolv.conf` from a prior [`DnsBackup::Replaced`].
pub fn restore_dns(backup: &DnsBackup) -> std::io::Result<()> {
    match backup {
        DnsBackup::Replaced { prior_contents } => std::fs::write(RESOLV_CONF, prior_contents),
        DnsBackup::Skipped { .. } => Ok(()),
    }
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn dnsmasq_active() -> bool {
    std::process::Command::new("pgrep")
        .args(["-x", "dnsmasq"])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_when_no_servers_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        let result = configure_dns_at(&path, &[]);
        assert!(matches!(result, DnsBackup::Skipped { .. }));
    }

    #[test]
    fn skips_when_target_is_a_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real-resolv.conf");
        std::fs::write(&real, "nameserver 1.1.1.1\n").unwrap();
        let link = dir.path().join("resolv.conf");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let result = configure_dns_at(&link, &["8.8.8.8".to_string()]);
        assert!(matches!(result, DnsBackup::Skipped { .. }));
    }

    #[test]
    fn replaces_plain_file_and_captures_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        std::fs::write(&path, "nameserver 10.0.0.1\n").unwrap();

        let result = configure_dns_at(&path, &["1.1.1.1".to_string(), "8.8.8.8".to_string()]);
        match result {
            DnsBackup::Replaced { prior_contents } => {
                assert_eq!(prior_contents, "nameserver 10.0.0.1\n");
            }
            other => panic!("expected Replaced, got {other:?}"),
        }
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "nameserver 1.1.1.1\nnameserver 8.8.8.8\n");
    }
}
