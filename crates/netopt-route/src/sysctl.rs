//! `tune_sysctl`: apply the configured TCP profile, backing up prior
//! values key-by-key so the safety envelope's rollback path can restore
//! them exactly (§4.6, §4.8).

use netopt_common::clock::run_quick;
use netopt_common::error::Result;
use netopt_common::model::SysctlBackup;

/// One sysctl key to apply, expressed with its fully-qualified name.
pub struct SysctlSetting {
    pub key: String,
    pub value: String,
}

/// Apply `profile`, returning a backup of the prior value for every key
/// that was actually present (and thus changed).
pub async fn tune_sysctl(profile: &[SysctlSetting]) -> Result<SysctlBackup> {
    let mut backup = SysctlBackup::new();

    for setting in profile {
        if let Ok(prior) = read_sysctl(&setting.key).await {
            backup.insert(setting.key.clone(), prior);
        }
        let assignment = format!("{}={}", setting.key, setting.value);
        let output = run_quick("sysctl", &["-w", &assignment]).await?;
        if !output.status_success {
            tracing::warn!(key = %setting.key, stderr = %output.stderr, "sysctl -w failed");
        }
    }

    Ok(backup)
}

/// Restore every key in `backup` to its recorded prior value.
pub async fn restore_sysctl(backup: &SysctlBackup) -> Result<()> {
    for (key, value) in backup {
        let assignment = format!("{key}={value}");
        let output = run_quick("sysctl", &["-w", &assignment]).await?;
        if !output.status_success {
            tracing::warn!(key = %key, stderr = %output.stderr, "sysctl restore failed");
        }
    }
    Ok(())
}

/// The conservative profile the watchdog's rollback script re-applies on
/// expiry (§4.8): `tcp_congestion_control=cubic`, `default_qdisc=pfifo_fast`.
pub fn conservative_profile() -> Vec<SysctlSetting> {
    vec![
        SysctlSetting {
            key: "net.ipv4.tcp_congestion_control".to_string(),
            value: "cubic".to_string(),
        },
        SysctlSetting {
            key: "net.core.default_qdisc".to_string(),
            value: "pfifo_fast".to_string(),
        },
    ]
}

async fn read_sysctl(key: &str) -> Result<String> {
    let output = run_quick("sysctl", &["-n", key]).await?;
    Ok(output.stdout.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conservative_profile_has_expected_keys() {
        let profile = conservative_profile();
        assert!(profile.iter().any(|s| s.key == "net.ipv4.tcp_congestion_control"));
        assert!(profile.iter().any(|s| s.key == "net.core.default_qdisc"));
    }
}
