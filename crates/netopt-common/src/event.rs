//! Structured event emission (C9).
//!
//! netopt reports everything it does through [`tracing`] rather than ad-hoc
//! `println!`s — `--json` output, log files, and the audit trail all read
//! from the same span/event stream. [`Event`] is the explicit tagged union
//! of the handful of event kinds the rest of the system can emit, covering
//! netopt's apply/probe/checkpoint/watchdog lifecycle.

use serde::{Deserialize, Serialize};

/// One structured event in netopt's lifecycle. Every variant is logged via
/// [`EventSink::emit`] at the severity appropriate to its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    ProbeStarted { link: String },
    ProbeCompleted { link: String, alive: bool, latency_ms: Option<f64> },
    PlanComputed { entries: usize },
    ApplyStarted { entries: usize },
    ApplyCommitted,
    ApplyRolledBack { reason: String },
    WatchdogArmed { timeout_s: u64 },
    WatchdogConfirmed,
    WatchdogFired,
    CheckpointCreated { id: String },
    CheckpointRestored { id: String },
}

/// Thin wrapper around `tracing` that gives every netopt crate one call
/// site per event instead of scattering ad-hoc `tracing::info!` calls with
/// inconsistent field names.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventSink;

impl EventSink {
    pub fn emit(&self, event: &Event) {
        match event {
            Event::ProbeStarted { link } => {
                tracing::debug!(link = %link, "probe started");
            }
            Event::ProbeCompleted { link, alive, latency_ms } => {
                tracing::info!(link = %link, alive, latency_ms, "probe completed");
            }
            Event::PlanComputed { entries } => {
                tracing::info!(entries, "plan computed");
            }
            Event::ApplyStarted { entries } => {
                tracing::info!(entries, "apply started");
            }
            Event::ApplyCommitted => {
                tracing::info!("apply committed");
            }
            Event::ApplyRolledBack { reason } => {
                tracing::warn!(reason = %reason, "apply rolled back");
            }
            Event::WatchdogArmed { timeout_s } => {
                tracing::info!(timeout_s, "watchdog armed");
            }
            Event::WatchdogConfirmed => {
                tracing::info!("watchdog confirmed, rollback disarmed");
            }
            Event::WatchdogFired => {
                tracing::error!("watchdog fired, rolling back");
            }
            Event::CheckpointCreated { id } => {
                tracing::info!(checkpoint = %id, "checkpoint created");
            }
            Event::CheckpointRestored { id } => {
                tracing::info!(checkpoint = %id, "checkpoint restored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_does_not_panic_for_every_variant() {
        let sink = EventSink;
        sink.emit(&Event::ProbeStarted { link: "wan0".into() });
        sink.emit(&Event::ProbeCompleted {
            link: "wan0".into(),
            alive: true,
            latency_ms: Some(12.3),
        });
        sink.emit(&Event::WatchdogFired);
    }
}
