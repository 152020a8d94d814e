//! Transaction state machine (§4.6's diagram):
//!
//! ```text
//!                  begin
//! IDLE ─────────────────────────→ OPEN
//! OPEN ── apply_ok ──────→ APPLIED
//! OPEN ── apply_fail ────→ ROLLED_BACK (auto)
//! APPLIED ── confirm ────→ COMMITTED (terminal)
//! APPLIED ── reject / watchdog_fire → ROLLED_BACK (terminal)
//! Any failure during ROLLED_BACK → FATAL (terminal; operator intervention)
//! ```

use netopt_common::error::{NetoptError, Result};
use netopt_common::model::{DnsBackup, RouteBackup, SysctlBackup, TransactionState};

/// Drives one apply/rollback cycle through [`TransactionState`]. Holds the
/// backups captured at `begin` so `reject`/`watchdog_fire` can always find
/// what to restore, regardless of which later step failed.
pub struct Transaction {
    state: TransactionState,
    pub route_backup: Option<RouteBackup>,
    pub sysctl_backup: Option<SysctlBackup>,
    pub dns_backup: Option<DnsBackup>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction {
            state: TransactionState::Idle,
            route_backup: None,
            sysctl_backup: None,
            dns_backup: None,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// IDLE → OPEN, recording the pre-apply backups.
    pub fn begin(&mut self, route_backup: RouteBackup) -> Result<()> {
        self.require(TransactionState::Idle)?;
        self.route_backup = Some(route_backup);
        self.state = TransactionState::Open;
        Ok(())
    }

    /// OPEN → APPLIED.
    pub fn apply_ok(&mut self) -> Result<()> {
        self.require(TransactionState::Open)?;
        self.state = TransactionState::Applied;
        Ok(())
    }

    /// OPEN → ROLLED_BACK. The caller performs the actual restore before
    /// or after this call; this method only records that it happened.
    pub fn apply_fail(&mut self) -> Result<()> {
        self.require(TransactionState::Open)?;
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    /// APPLIED → COMMITTED (terminal).
    pub fn confirm(&mut self) -> Result<()> {
        self.require(TransactionState::Applied)?;
        self.state = TransactionState::Committed;
        Ok(())
    }

    /// APPLIED → ROLLED_BACK (terminal), via either an explicit operator
    /// rejection or the watchdog firing.
    pub fn reject(&mut self) -> Result<()> {
        self.require(TransactionState::Applied)?;
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    /// A failure encountered while already ROLLED_BACK escalates to FATAL
    /// — the system may be left in a mutated state and needs an operator.
    pub fn mark_fatal(&mut self) {
        self.state = TransactionState::Fatal;
    }

    fn require(&self, expected: TransactionState) -> Result<()> {
        if self.state != expected {
            return Err(NetoptError::Other(format!(
                "invalid transaction transition: expected {:?}, was {:?}",
                expected, self.state
            )));
        }
        Ok(())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_backup() -> RouteBackup {
        RouteBackup::empty()
    }

    #[test]
    fn happy_path_commits() {
        let mut tx = Transaction::new();
        tx.begin(empty_backup()).unwrap();
        assert_eq!(tx.state(), TransactionState::Open);
        tx.apply_ok().unwrap();
        assert_eq!(tx.state(), TransactionState::Applied);
        tx.confirm().unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert!(tx.state().is_terminal());
    }

    #[test]
    fn apply_failure_auto_rolls_back() {
        let mut tx = Transaction::new();
        tx.begin(empty_backup()).unwrap();
        tx.apply_fail().unwrap();
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert!(tx.state().is_terminal());
    }

    #[test]
    fn watchdog_fire_rejects_from_applied() {
        let mut tx = Transaction::new();
        tx.begin(empty_backup()).unwrap();
        tx.apply_ok().unwrap();
        tx.reject().unwrap();
        assert_eq!(tx.state(), TransactionState::RolledBack);
    }

    #[test]
    fn cannot_confirm_before_applied() {
        let mut tx = Transaction::new();
        tx.begin(empty_backup()).unwrap();
        assert!(tx.confirm().is_err());
    }

    #[test]
    fn failure_during_rollback_escalates_to_fatal() {
        let mut tx = Transaction::new();
        tx.begin(empty_backup()).unwrap();
        tx.apply_fail().unwrap();
        tx.mark_fatal();
        assert_eq!(tx.state(), TransactionState::Fatal);
        assert!(tx.state().is_terminal());
    }
}
