//! `netopt watchdog {start,confirm,cancel,extend,status}` (§4.8).
//!
//! Each invocation is a fresh process: state is loaded from
//! `<state_root>/watchdog-state.json`, acted on, and (except for
//! `status`) the on-disk state is updated or removed to match.

use netopt_common::config::Config;
use netopt_common::error::{NetoptError, Result};
use netopt_common::event::{Event, EventSink};
use netopt_safety::watchdog::{self, Watchdog, WatchdogState};

use crate::cli::WatchdogAction;

pub async fn run(config: &Config, action: &WatchdogAction) -> Result<i32> {
    match action {
        WatchdogAction::Start { timeout_secs } => {
            let path = crate::config_paths::route_backup_path(&config.state_root);
            let text = std::fs::read_to_string(&path).map_err(NetoptError::Io)?;
            let backup: netopt_common::model::RouteBackup = serde_json::from_str(&text)
                .map_err(|e| NetoptError::Other(format!("route backup is not valid: {e}")))?;

            let timeout = std::time::Duration::from_secs(timeout_secs.unwrap_or(config.watchdog_timeout));
            let max_extend = std::time::Duration::from_secs(config.max_watchdog_extend);
            let _watchdog = Watchdog::arm_and_persist(&config.state_root, timeout, max_extend, &backup)?;
            EventSink.emit(&Event::WatchdogArmed {
                timeout_s: timeout.as_secs(),
            });
            println!("watchdog armed for {}s", timeout.as_secs());
        }
        WatchdogAction::Confirm => {
            let state = load_or_bail(config)?;
            watchdog::confirm_persisted(&config.state_root, &state)?;
            EventSink.emit(&Event::WatchdogConfirmed);
            println!("watchdog confirmed, rollback disarmed");
        }
        WatchdogAction::Cancel => {
            let state = load_or_bail(config)?;
            watchdog::cancel_persisted(&config.state_root, &state)?;
            EventSink.emit(&Event::WatchdogFired);
            println!("watchdog cancelled, rolled back immediately");
        }
        WatchdogAction::Extend { seconds } => {
            let mut state = load_or_bail(config)?;
            watchdog::extend_persisted(&config.state_root, &mut state, *seconds)?;
            println!(
                "extended watchdog by {seconds}s ({}s remaining in budget)",
                state.remaining_budget_secs
            );
        }
        WatchdogAction::Status => match WatchdogState::load(&config.state_root)? {
            Some(state) => println!(
                "armed={} unit={} remaining_budget={}s max_extend={}s",
                state.armed, state.unit_name, state.remaining_budget_secs, state.max_extend_secs
            ),
            None => println!("no watchdog armed"),
        },
    }

    Ok(0)
}

fn load_or_bail(config: &Config) -> Result<WatchdogState> {
    WatchdogState::load(&config.state_root)?
        .ok_or_else(|| NetoptError::Other("no watchdog is currently armed".to_string()))
}
