//! Default filesystem layout (§6): config search paths and the
//! `<state_root>`-relative locations every command reads or writes.

use std::path::{Path, PathBuf};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/netopt/netopt.conf";
pub const DEFAULT_STATE_ROOT: &str = "/var/lib/netopt";

pub fn user_config_path() -> PathBuf {
    dirs_home()
        .map(|home| home.join(".config/netopt/netopt.conf"))
        .unwrap_or_else(|| PathBuf::from(".config/netopt/netopt.conf"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

pub fn route_backup_path(state_root: &Path) -> PathBuf {
    state_root.join("route-backup")
}

/// The last `apply`'s summary (§6's filesystem layout: "`state` (apply
/// summary)") — a small JSON record of what was planned and whether it
/// committed, for `status` or an operator to inspect without re-running
/// probes.
pub fn apply_summary_path(state_root: &Path) -> PathBuf {
    state_root.join("state")
}

pub fn lock_path(state_root: &Path) -> PathBuf {
    state_root.join("netopt.lock")
}
