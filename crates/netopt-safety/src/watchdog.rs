//! Watchdog (§4.8): arms a rollback timer the moment `apply` succeeds on a
//! remote session, and exposes `confirm`/`cancel`/`extend`. The rollback
//! itself runs out-of-band — as a transient `systemd-run` timer when
//! available, falling back to a detached `setsid` sleep — so a crash of
//! the main process still leads to rollback.

use std::io::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use netopt_common::error::{NetoptError, Result};
use netopt_common::model::RouteBackup;

/// Env vars whose presence (non-empty) marks this session as remote
/// (§4.8). Multiplexers are informational only and never flip this.
const REMOTE_ENV_VARS: &[&str] = &["SSH_CONNECTION", "SSH_CLIENT", "SSH_TTY"];

/// True if the current invocation looks like a remote session.
pub fn is_remote() -> bool {
    REMOTE_ENV_VARS
        .iter()
        .any(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
}

pub struct Watchdog {
    rollback_script: PathBuf,
    unit_name: String,
    remaining_budget: Duration,
    max_extend: Duration,
    armed: bool,
}

impl Watchdog {
    /// Arm a rollback timer for `timeout`, writing the backup and rollback
    /// script under `state_root` and scheduling the out-of-band timer.
    pub fn arm(
        state_root: &Path,
        timeout: Duration,
        max_extend: Duration,
        route_backup: &RouteBackup,
    ) -> Result<Self> {
        std::fs::create_dir_all(state_root).map_err(NetoptError::Io)?;

        let backup_path = state_root.join("watchdog-backup.json");
        let backup_json = serde_json::to_string_pretty(route_backup)
            .map_err(|e| NetoptError::Other(format!("cannot serialize route backup: {e}")))?;
        std::fs::write(&backup_path, backup_json).map_err(NetoptError::Io)?;

        let script_path = state_root.join("watchdog-rollback.sh");
        write_rollback_script(&script_path, &backup_path)?;

        let unit_name = format!("netopt-watchdog-{}", std::process::id());
        schedule_timer(&unit_name, &script_path, timeout)?;

        Ok(Watchdog {
            rollback_script: script_path,
            unit_name,
            remaining_budget: max_extend,
            max_extend,
            armed: true,
        })
    }

    /// Disarm and commit: cancel the supervising timer without running
    /// the rollback script.
    pub fn confirm(mut self) -> Result<()> {
        self.disarm_timer();
        self.armed = false;
        let _ = std::fs::remove_file(&self.rollback_script);
        Ok(())
    }

    /// Disarm and roll back immediately — runs the same script the
    /// expiry path would have run, synchronously.
    pub fn cancel(mut self) -> Result<()> {
        self.disarm_timer();
        self.armed = false;
        run_rollback_script(&self.rollback_script)
    }

    /// Extend the armed window by `seconds`, bounded by `max_extend`
    /// total budget from the original arm.
    pub fn extend(&mut self, seconds: u64) -> Result<()> {
        let requested = Duration::from_secs(seconds);
        if requested > self.remaining_budget {
            return Err(NetoptError::Other(format!(
                "extend request of {seconds}s exceeds remaining watchdog budget of {}s",
                self.remaining_budget.as_secs()
            )));
        }
        self.remaining_budget -= requested;
        schedule_timer(&self.unit_name, &self.rollback_script, requested)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn max_extend(&self) -> Duration {
        self.max_extend
    }

    fn disarm_timer(&self) {
        let _ = std::process::Command::new("systemctl")
            .args(["stop", &format!("{}.timer", self.unit_name)])
            .status();
    }

    /// Snapshot this handle to a [`WatchdogState`] for persistence across
    /// processes — `apply` arms the watchdog and exits; `watchdog
    /// {confirm,cancel,extend,status}` run later as separate invocations
    /// and need something on disk to act on.
    pub fn to_state(&self) -> WatchdogState {
        WatchdogState {
            unit_name: self.unit_name.clone(),
            rollback_script: self.rollback_script.clone(),
            remaining_budget_secs: self.remaining_budget.as_secs(),
            max_extend_secs: self.max_extend.as_secs(),
            armed: self.armed,
        }
    }

    /// Arm, then persist the resulting state to
    /// `<state_root>/watchdog-state.json` so a later, separate `netopt
    /// watchdog ...` invocation can find it.
    pub fn arm_and_persist(
        state_root: &Path,
        timeout: Duration,
        max_extend: Duration,
        route_backup: &RouteBackup,
    ) -> Result<Self> {
        let watchdog = Self::arm(state_root, timeout, max_extend, route_backup)?;
        watchdog.to_state().save(state_root)?;
        Ok(watchdog)
    }
}

/// The subset of [`Watchdog`]'s state that survives across process
/// boundaries, serialized to `<state_root>/watchdog-state.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogState {
    pub unit_name: String,
    pub rollback_script: PathBuf,
    pub remaining_budget_secs: u64,
    pub max_extend_secs: u64,
    pub armed: bool,
}

fn state_path(state_root: &Path) -> PathBuf {
    state_root.join("watchdog-state.json")
}

impl WatchdogState {
    /// Write this state to `<state_root>/watchdog-state.json`.
    pub fn save(&self, state_root: &Path) -> Result<()> {
        std::fs::create_dir_all(state_root).map_err(NetoptError::Io)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| NetoptError::Other(format!("cannot serialize watchdog state: {e}")))?;
        std::fs::write(state_path(state_root), json).map_err(NetoptError::Io)
    }

    /// Load the persisted state, or `Ok(None)` if no watchdog is
    /// currently armed (`netopt watchdog status` with nothing pending is
    /// not an error).
    pub fn load(state_root: &Path) -> Result<Option<WatchdogState>> {
        let path = state_path(state_root);
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| NetoptError::Other(format!("cannot parse watchdog state: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NetoptError::Io(e)),
        }
    }

    fn remove(state_root: &Path) {
        let _ = std::fs::remove_file(state_path(state_root));
    }

    fn disarm_timer(&self) {
        let _ = std::process::Command::new("systemctl")
            .args(["stop", &format!("{}.timer", self.unit_name)])
            .status();
    }
}

/// `netopt watchdog confirm`: disarm the persisted timer without
/// rolling back, and remove the state file.
pub fn confirm_persisted(state_root: &Path, state: &WatchdogState) -> Result<()> {
    state.disarm_timer();
    let _ = std::fs::remove_file(&state.rollback_script);
    WatchdogState::remove(state_root);
    Ok(())
}

/// `netopt watchdog cancel`: disarm the persisted timer and run the
/// rollback script synchronously, same as an in-process `cancel`.
pub fn cancel_persisted(state_root: &Path, state: &WatchdogState) -> Result<()> {
    state.disarm_timer();
    let result = run_rollback_script(&state.rollback_script);
    WatchdogState::remove(state_root);
    result
}

/// `netopt watchdog extend <seconds>`: reschedule the timer for
/// `seconds` more, bounded by the remaining budget recorded at arm time.
pub fn extend_persisted(state_root: &Path, state: &mut WatchdogState, seconds: u64) -> Result<()> {
    if seconds > state.remaining_budget_secs {
        return Err(NetoptError::Other(format!(
            "extend request of {seconds}s exceeds remaining watchdog budget of {}s",
            state.remaining_budget_secs
        )));
    }
    state.remaining_budget_secs -= seconds;
    schedule_timer(
        &state.unit_name,
        &state.rollback_script,
        Duration::from_secs(seconds),
    )?;
    state.save(state_root)
}

fn write_rollback_script(script_path: &Path, backup_path: &Path) -> Result<()> {
    let netopt_exe = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "netopt".to_string());

    let script = format!(
        "#!/bin/sh\nset -eu\n\
         for iface in $(ls /sys/class/net); do\n\
         \ttc qdisc del dev \"$iface\" root 2>/dev/null || true\n\
         done\n\
         sysctl -w net.ipv4.tcp_congestion_control=cubic >/dev/null 2>&1 || true\n\
         sysctl -w net.core.default_qdisc=pfifo_fast >/dev/null 2>&1 || true\n\
         {netopt_exe} restore --backup-file {backup} --reason watchdog\n",
        backup = shell_quote(backup_path.to_string_lossy().as_ref()),
    );

    let mut file = std::fs::File::create(script_path).map_err(NetoptError::Io)?;
    file.write_all(script.as_bytes()).map_err(NetoptError::Io)?;
    std::fs::set_permissions(script_path, std::fs::Permissions::from_mode(0o700))
        .map_err(NetoptError::Io)?;
    Ok(())
}

/// Single-quote a path for embedding in the generated shell script. The
/// path comes from `state_root`, an operator-controlled config value, not
/// attacker input, but quoting it is cheap and avoids word-splitting on
/// unusual paths.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn schedule_timer(unit_name: &str, script_path: &Path, delay: Duration) -> Result<()> {
    let on_active = format!("--on-active={}s", delay.as_secs().max(1));
    let systemd_ok = std::process::Command::new("systemd-run")
        .args([
            "--unit",
            unit_name,
            &on_active,
            "--",
            &script_path.display().to_string(),
        ])
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    if systemd_ok {
        return Ok(());
    }

    // systemd unavailable (container, non-systemd host): fall back to a
    // detached sleep-then-exec, survivable as long as the host itself
    // stays up even if this process dies.
    std::process::Command::new("setsid")
        .arg("sh")
        .arg("-c")
        .arg(format!(
            "sleep {} && exec {}",
            delay.as_secs(),
            script_path.display()
        ))
        .spawn()
        .map(|_| ())
        .map_err(|e| NetoptError::Other(format!("cannot schedule watchdog fallback timer: {e}")))
}

fn run_rollback_script(script_path: &Path) -> Result<()> {
    let status = std::process::Command::new(script_path)
        .status()
        .map_err(|e| NetoptError::Other(format!("failed to run rollback script: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(NetoptError::WatchdogFired(format!(
            "rollback script exited with status {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_detection_honors_ssh_connection() {
        std::env::set_var("SSH_CONNECTION", "1.2.3.4 22 5.6.7.8 22");
        assert!(is_remote());
        std::env::remove_var("SSH_CONNECTION");
    }

    #[test]
    fn remote_detection_false_when_unset() {
        std::env::remove_var("SSH_CONNECTION");
        std::env::remove_var("SSH_CLIENT");
        std::env::remove_var("SSH_TTY");
        assert!(!is_remote());
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn write_rollback_script_is_executable() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("rollback.sh");
        let backup_path = dir.path().join("backup.json");
        write_rollback_script(&script_path, &backup_path).unwrap();
        let mode = std::fs::metadata(&script_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn watchdog_state_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let state = WatchdogState {
            unit_name: "netopt-watchdog-1234".to_string(),
            rollback_script: dir.path().join("watchdog-rollback.sh"),
            remaining_budget_secs: 1800,
            max_extend_secs: 1800,
            armed: true,
        };
        state.save(dir.path()).unwrap();

        let loaded = WatchdogState::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.unit_name, state.unit_name);
        assert_eq!(loaded.remaining_budget_secs, 1800);
    }

    #[test]
    fn watchdog_state_load_is_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WatchdogState::load(dir.path()).unwrap().is_none());
    }
}
