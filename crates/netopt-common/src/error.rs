//! Typed error taxonomy shared by every netopt crate, and the exit-code
//! mapping the CLI binary uses to translate a failure into a process exit
//! status.

use thiserror::Error;

/// The netopt error taxonomy. Each variant carries the context needed to
/// render a useful message; [`NetoptError::exit_code`] maps each variant
/// to a distinct process exit code an operator or script can branch on.
#[derive(Debug, Error)]
pub enum NetoptError {
    #[error("interface inventory failed: {0}")]
    Inventory(String),

    #[error("probe deadline exceeded for {link} after {elapsed_ms}ms")]
    ProbeDeadline { link: String, elapsed_ms: u64 },

    #[error("could not clear existing default route before apply: {0}")]
    CannotClear(String),

    #[error("route apply failed: {0}")]
    ApplyFailed(String),

    #[error("pre-flight check failed: {0}")]
    Preflight(String),

    #[error("post-apply validation failed: {0}")]
    PostValidate(String),

    #[error("watchdog fired, rolled back to prior state: {0}")]
    WatchdogFired(String),

    #[error("checkpoint operation failed: {0}")]
    Checkpoint(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("netopt is locked by another instance (pid {pid})")]
    Locked { pid: i32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl NetoptError {
    /// Distinct exit code per failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            NetoptError::Inventory(_) => 1,
            NetoptError::ProbeDeadline { .. } => 1,
            NetoptError::CannotClear(_) => 1,
            NetoptError::ApplyFailed(_) => 1,
            NetoptError::Preflight(_) => 6,
            NetoptError::PostValidate(_) => 7,
            NetoptError::WatchdogFired(_) => 8,
            NetoptError::Checkpoint(_) => 5,
            NetoptError::Config(_) => 4,
            NetoptError::Locked { .. } => 2,
            NetoptError::Io(_) => 1,
            NetoptError::Other(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, NetoptError>;
