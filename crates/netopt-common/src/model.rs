//! Data model shared across the probe, planner, route, checkpoint, and
//! safety crates.
//!
//! Ownership flows unidirectionally: Inventory → Planner → Applicator.
//! The only entities that cross that pipeline by reference rather than by
//! value are the [`Config`](crate::config::Config) snapshot and the probe
//! cache (owned by `netopt-probe`).

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Link classification, in the order the classification policy tests them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkClass {
    Ethernet,
    Wifi,
    Mobile,
    Unknown,
}

impl LinkClass {
    /// Default class-priority ordinal (lower wins ties). Overridden by the
    /// `PRIORITY_*` configuration keys.
    pub fn default_priority(self) -> u32 {
        match self {
            LinkClass::Ethernet => 0,
            LinkClass::Wifi => 1,
            LinkClass::Mobile => 2,
            LinkClass::Unknown => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkClass::Ethernet => "ethernet",
            LinkClass::Wifi => "wifi",
            LinkClass::Mobile => "mobile",
            LinkClass::Unknown => "unknown",
        }
    }
}

/// A kernel network interface, as enumerated by the Interface Inventory (C2).
///
/// Immutable for the duration of one `apply` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub class: LinkClass,
    pub admin_up: bool,
    pub carrier: bool,
    pub mac: Option<String>,
    pub mtu: Option<u32>,
    pub speed_mbps: Option<u64>,
}

/// The upstream gateway for a [`Link`], discovered from the routing table.
///
/// `None` when the link has no default route of its own — such links are
/// excluded from planning.
pub type Gateway = Option<Ipv4Addr>;

/// Where a [`Probe`] measurement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeSource {
    Fresh,
    Cached,
}

/// Result of measuring one `(link, gateway)` pair.
///
/// A tagged union rather than a `latency: Option<f64>` flag field: a dead
/// gateway has no latency to report, so the type only offers one when
/// there's one to give.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProbeOutcome {
    Alive {
        latency_ms: f64,
        jitter_ms: Option<f64>,
        loss_pct: f64,
        mtu: Option<u32>,
    },
    Dead {
        loss_pct: f64,
    },
}

impl ProbeOutcome {
    pub fn is_alive(&self) -> bool {
        matches!(self, ProbeOutcome::Alive { .. })
    }

    pub fn loss_pct(&self) -> f64 {
        match self {
            ProbeOutcome::Alive { loss_pct, .. } => *loss_pct,
            ProbeOutcome::Dead { loss_pct } => *loss_pct,
        }
    }

    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            ProbeOutcome::Alive { latency_ms, .. } => Some(*latency_ms),
            ProbeOutcome::Dead { .. } => None,
        }
    }
}

/// A full probe record: outcome plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probe {
    pub link: String,
    pub gateway: Ipv4Addr,
    pub outcome: ProbeOutcome,
    pub measured_at: Duration,
    pub source: ProbeSource,
    pub as_path: Option<AsPathAnnotation>,
}

impl Probe {
    pub fn is_alive(&self) -> bool {
        self.outcome.is_alive()
    }
}

/// Optional per-probe AS-path enrichment produced by C4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsPathAnnotation {
    pub as_numbers: Vec<u32>,
    pub tier1_present: bool,
}

impl AsPathAnnotation {
    pub fn hop_count(&self) -> usize {
        self.as_numbers.len()
    }
}

/// Per-link candidate produced by the Weight Planner (C5).
///
/// Invariant: exists only for probes classified alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub link: String,
    pub gateway: Ipv4Addr,
    pub class: LinkClass,
    pub weight: u32,
    pub probe: Probe,
    pub rationale: String,
}

/// Ordered sequence of [`PlanEntry`], sorted per §4.5's tie-break rules.
///
/// Invariant: `len() >= 1` is required before `apply` may proceed; an empty
/// plan aborts with no mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Metadata describing a captured [`crate::config`]-independent system
/// snapshot managed by the Checkpoint Store (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at_utc: String,
    pub hostname: String,
    pub kernel: String,
    pub uid: u32,
}

/// A single textual default-route `nexthop` clause as captured by
/// [`crate::model::RouteBackup`] — e.g. `via 192.168.1.1 dev eth0 weight 40`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteBackupEntry {
    pub raw: String,
}

/// The prior default-route state captured at the start of a transaction.
///
/// Distinct from a [`CheckpointMeta`]-addressed archive: this is the small,
/// fast, JSON-serialized backup that `restore` and watchdog-expiry replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteBackup {
    pub captured_at_utc: String,
    pub entries: Vec<RouteBackupEntry>,
}

impl RouteBackup {
    pub fn empty() -> Self {
        RouteBackup {
            captured_at_utc: String::new(),
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Prior sysctl values captured before [`crate::config::Config`]'s TCP
/// profile was applied, keyed by fully-qualified sysctl key
/// (e.g. `net.ipv4.tcp_congestion_control`).
pub type SysctlBackup = std::collections::BTreeMap<String, String>;

/// Outcome of `configure_dns`: either the prior resolver file contents (to
/// be restored), or a reason the write was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DnsBackup {
    Replaced { prior_contents: String },
    Skipped { reason: String },
}

/// Summary of the most recent `apply` invocation, written to
/// `<state_root>/state` (§6's filesystem layout) so `status` or an
/// operator can see what happened without re-running probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplySummary {
    pub applied_at_utc: String,
    pub plan: Plan,
    pub committed: bool,
    pub watchdog_armed: bool,
    pub checkpoint_id: Option<String>,
}

/// Explicit transaction state machine (§4.6).
///
/// Terminal states: `Committed`, `RolledBack`, `Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    Idle,
    Open,
    Applied,
    Committed,
    RolledBack,
    Fatal,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::RolledBack | TransactionState::Fatal
        )
    }
}
