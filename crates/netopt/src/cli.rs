//! Command-line surface (§6): the verbs `apply`, `restore`, `status`,
//! `checkpoint {create,list,restore,delete,prune}`, and `watchdog
//! {start,confirm,cancel,extend,status}`, in the nested-subcommand style
//! of the `gwarden`-shaped CLIs in the reference pack.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Linux multipath routing optimizer.
#[derive(Parser, Debug)]
#[command(name = "netopt", version, about = "Linux multipath routing optimizer", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (repeatable: -q, -qq).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Path to a system-level config file override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override `<state_root>` for all state/checkpoint/lock files.
    #[arg(long, global = true)]
    pub state_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe every eligible gateway, plan weighted next-hops, and apply
    /// a single multipath default route inside a safety transaction.
    Apply(ApplyArgs),

    /// Reinstate the most recent route backup without requiring a prior
    /// in-process transaction (operator-invoked emergency restore).
    Restore(RestoreArgs),

    /// Inventory links and probe gateways without planning or mutating
    /// anything; prints a read-only status table.
    Status,

    /// Checkpoint store operations.
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Remote-session watchdog operations.
    Watchdog {
        #[command(subcommand)]
        action: WatchdogAction,
    },
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Disable the remote-session watchdog even if this looks like a
    /// remote invocation.
    #[arg(long)]
    pub no_watchdog: bool,

    /// Disable AS-path annotation for this run, overriding `ENABLE_BGP`.
    #[arg(long)]
    pub no_bgp: bool,

    /// Skip checkpoint capture for this run, overriding `ENABLE_CHECKPOINTS`.
    #[arg(long)]
    pub no_checkpoint: bool,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Restore from a specific backup file instead of
    /// `<state_root>/route-backup`. Used by the watchdog's own rollback
    /// script.
    #[arg(long)]
    pub backup_file: Option<PathBuf>,

    /// Why this restore is happening (logged, not otherwise consumed).
    #[arg(long, default_value = "operator")]
    pub reason: String,
}

#[derive(Subcommand, Debug)]
pub enum CheckpointAction {
    /// Capture a full system-state snapshot.
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List checkpoints, oldest first.
    List,
    /// Restore a checkpoint's safe subset (sysctl net.*, qdisc reset).
    Restore { id: String },
    /// Delete a checkpoint by id.
    Delete { id: String },
    /// Enforce `CHECKPOINT_RETENTION`, deleting the oldest excess.
    Prune,
}

#[derive(Subcommand, Debug)]
pub enum WatchdogAction {
    /// Arm a standalone watchdog window (mainly for testing/demo; `apply`
    /// arms one automatically on a detected remote session).
    Start {
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Disarm and commit: cancel the rollback timer.
    Confirm,
    /// Disarm and roll back immediately.
    Cancel,
    /// Extend the armed window.
    Extend { seconds: u64 },
    /// Report whether a watchdog is currently armed, and time remaining.
    Status,
}
