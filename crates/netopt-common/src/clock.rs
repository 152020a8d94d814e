//! Monotonic timing and deadline-bound subprocess execution (C1).
//!
//! Every external tool invocation (`ip`, `ping`, `mtr`, `resolvectl`, ...)
//! goes through [`run`] so that a hung child can never outlive its caller's
//! deadline — the child is placed in its own process group at spawn time
//! and the whole group is killed if the deadline elapses before it exits.

use std::os::unix::process::CommandExt as _;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::error::{NetoptError, Result};

/// A monotonic instant, re-exported so callers don't need to depend on
/// `std::time` directly for measuring elapsed probe/apply durations.
pub fn now() -> Instant {
    Instant::now()
}

/// The outcome of a deadline-bound subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Run `program` with `args`, killing the whole process group if it has not
/// exited by `deadline`.
///
/// The child is detached into its own process group (`setsid`-equivalent,
/// via `process_group(0)`) specifically so that a tool which itself forks
/// helpers (`mtr`, some `ip` invocations under network namespaces) cannot
/// survive the kill by orphaning grandchildren outside the group.
pub async fn run(program: &str, args: &[&str], deadline: Duration) -> Result<CommandOutput> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Detach into a new process group so a timeout kill (`kill(-pgid, ...)`)
    // reaches helper processes the tool itself forked, not just the exec'd
    // binary.
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| {
        NetoptError::Other(format!("failed to spawn `{program}`: {e}"))
    })?;
    let pid = child.id().map(|p| p as i32);

    let outcome = tokio::time::timeout(deadline, child.wait_with_output()).await;

    match outcome {
        Ok(Ok(output)) => Ok(CommandOutput {
            status_success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: start.elapsed(),
        }),
        Ok(Err(e)) => Err(NetoptError::Other(format!("`{program}` wait failed: {e}"))),
        Err(_timeout) => {
            if let Some(pid) = pid {
                // Negative pid targets the whole process group.
                unsafe {
                    libc::kill(-pid, libc::SIGKILL);
                }
            }
            Err(NetoptError::ProbeDeadline {
                link: program.to_string(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Run `program` with no enforced deadline beyond the process default
/// timeout bucket from config — used for short, trusted local commands
/// (`ip route replace`, `sysctl -w`) where C1's deadline machinery would be
/// overkill but argv-vector execution discipline still applies.
pub async fn run_quick(program: &str, args: &[&str]) -> Result<CommandOutput> {
    run(program, args, Duration::from_secs(10)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_true_succeeds() {
        let out = run("true", &[], Duration::from_secs(2)).await.unwrap();
        assert!(out.status_success);
    }

    #[tokio::test]
    async fn run_enforces_deadline() {
        let err = run("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        matches!(err, NetoptError::ProbeDeadline { .. });
    }
}
