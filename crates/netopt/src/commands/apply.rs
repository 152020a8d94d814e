//! `netopt apply` (§2's control flow, §4.6/§4.8's algorithms): the one
//! command that actually mutates routing/sysctl/DNS state, always inside
//! a [`Transaction`].
//!
//! Resolution of an ambiguity the distilled spec leaves open (recorded
//! in `DESIGN.md`): §2 says the watchdog arms at transaction `begin`,
//! while §4.8 says it arms "the moment `apply` succeeds", with post-apply
//! validation running *before* the confirmation window opens. This
//! implementation follows §4.8 (the more detailed, authoritative
//! description): arm only after a successful apply + passing post-apply
//! validation. Because `netopt` is a one-shot CLI process rather than a
//! daemon, a remote invocation that arms the watchdog does not block
//! waiting for `netopt watchdog confirm` — it exits 0 with the
//! transaction left `Applied`, and the operator (or the out-of-band
//! timer) resolves it later.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use netopt_common::config::Config;
use netopt_common::error::{NetoptError, Result as NetoptResult};
use netopt_common::event::{Event, EventSink};
use netopt_probe::ProbeCache;
use netopt_route::sysctl::SysctlSetting;
use netopt_safety::{Transaction, TransactionLock, Watchdog};

use crate::cli::ApplyArgs;
use crate::config_paths;

pub async fn run(config: &Config, args: &ApplyArgs) -> NetoptResult<i32> {
    let sink = EventSink;
    let _lock = TransactionLock::acquire(config_paths::lock_path(&config.state_root))?;

    run_inner(config, args, &sink)
        .await
        .map_err(|e| tag_and_return(&sink, e))
}

async fn run_inner(config: &Config, args: &ApplyArgs, sink: &EventSink) -> NetoptResult<i32> {
    let (links, pairs) = super::inventory_with_gateways(config)?;

    let default_gateway = pairs.first().map(|(_, gw)| *gw);
    netopt_safety::preflight::run(&links, default_gateway).await?;

    if pairs.is_empty() {
        return Err(NetoptError::Preflight(
            "no link has a discovered default gateway".to_string(),
        ));
    }

    let checkpoint_id = if config.enable_checkpoints && !args.no_checkpoint {
        let store =
            netopt_checkpoint::CheckpointStore::new(&config.state_root, config.checkpoint_retention);
        let files = netopt_checkpoint::capture::capture_all(&links);
        let id = store
            .create("pre-apply", "automatic pre-apply snapshot", &files)
            .map_err(|e| NetoptError::Checkpoint(e.to_string()))?;
        sink.emit(&Event::CheckpointCreated { id: id.clone() });
        Some(id)
    } else {
        None
    };

    let route_backup = netopt_route::backup().await?;
    persist_route_backup(config, &route_backup)?;

    let mut tx = Transaction::new();
    tx.begin(route_backup.clone())?;

    let enable_bgp = config.enable_bgp && !args.no_bgp;

    let probes = probe_all(config, &pairs).await;
    let probes = annotate_if_enabled(enable_bgp, probes).await;

    let mut plan_config = config.clone();
    plan_config.enable_bgp = enable_bgp;
    let plan = netopt_planner::plan(&links, &probes, &plan_config);
    sink.emit(&Event::PlanComputed {
        entries: plan.len(),
    });
    for entry in &plan.entries {
        tracing::info!(rationale = %entry.rationale, "plan entry");
    }

    if plan.is_empty() {
        return Err(NetoptError::Preflight(
            "no alive probes survived exclusion; refusing to apply an empty plan".to_string(),
        ));
    }

    sink.emit(&Event::ApplyStarted {
        entries: plan.len(),
    });
    if let Err(e) = netopt_route::apply(&plan).await {
        tx.apply_fail()?;
        rollback(&route_backup, checkpoint_id.as_deref(), sink).await;
        return Err(e);
    }
    tx.apply_ok()?;

    tx.sysctl_backup = apply_sysctl_profile(config).await?;
    tx.dns_backup = Some(netopt_route::configure_dns(&config.dns_servers));

    let first_gateway = plan.entries[0].gateway;
    if let Err(e) = netopt_safety::validate::validate_critical(&plan, first_gateway).await {
        tx.reject()?;
        rollback(&route_backup, checkpoint_id.as_deref(), sink).await;
        return Err(e);
    }
    let dns_ok = netopt_safety::validate::validate_dns(matches!(
        tx.dns_backup,
        Some(netopt_common::model::DnsBackup::Skipped { .. })
    ))
    .await;
    if !dns_ok {
        tracing::warn!("post-apply DNS canary resolution failed (non-fatal)");
    }

    let armed_remote_watchdog =
        netopt_safety::watchdog::is_remote() && config.enable_watchdog && !args.no_watchdog;
    if armed_remote_watchdog {
        let watchdog = Watchdog::arm_and_persist(
            &config.state_root,
            Duration::from_secs(config.watchdog_timeout),
            Duration::from_secs(config.max_watchdog_extend),
            &route_backup,
        )?;
        sink.emit(&Event::WatchdogArmed {
            timeout_s: config.watchdog_timeout,
        });
        println!(
            "applied; remote session detected, watchdog armed for {}s — run `netopt watchdog confirm` to commit",
            config.watchdog_timeout
        );
        drop(watchdog);
        persist_apply_summary(config, &plan, false, true, checkpoint_id.as_deref())?;
    } else {
        tx.confirm()?;
        sink.emit(&Event::ApplyCommitted);
        println!("applied and committed {} next-hop(s):", plan.len());
        persist_apply_summary(config, &plan, true, false, checkpoint_id.as_deref())?;
    }

    for entry in &plan.entries {
        println!("  {}", entry.rationale);
    }
    if let Some(id) = &checkpoint_id {
        println!("checkpoint: {id}");
    }

    Ok(0)
}

async fn probe_all(
    config: &Config,
    pairs: &[(String, Ipv4Addr)],
) -> Vec<netopt_common::model::Probe> {
    let cache = Arc::new(ProbeCache::new(&config.cache_root));
    let opts = super::probe_opts(config);
    let results = netopt_probe::probe_batch(cache, pairs.to_vec(), opts).await;
    results.into_values().collect()
}

async fn annotate_if_enabled(
    enable_bgp: bool,
    probes: Vec<netopt_common::model::Probe>,
) -> Vec<netopt_common::model::Probe> {
    if !enable_bgp {
        return probes;
    }
    let mut annotated = Vec::with_capacity(probes.len());
    for probe in probes {
        annotated.push(netopt_probe::annotate(probe).await);
    }
    annotated
}

async fn apply_sysctl_profile(
    config: &Config,
) -> NetoptResult<Option<netopt_common::model::SysctlBackup>> {
    let mut profile = Vec::new();
    if let Some(cc) = &config.tcp_congestion_control {
        profile.push(SysctlSetting {
            key: "net.ipv4.tcp_congestion_control".to_string(),
            value: cc.clone(),
        });
    }
    if let Some(fastopen) = config.tcp_fastopen {
        profile.push(SysctlSetting {
            key: "net.ipv4.tcp_fastopen".to_string(),
            value: fastopen.to_string(),
        });
    }
    if let Some(rmem) = config.rmem_max {
        profile.push(SysctlSetting {
            key: "net.core.rmem_max".to_string(),
            value: rmem.to_string(),
        });
    }
    if let Some(wmem) = config.wmem_max {
        profile.push(SysctlSetting {
            key: "net.core.wmem_max".to_string(),
            value: wmem.to_string(),
        });
    }
    if profile.is_empty() {
        return Ok(None);
    }
    Ok(Some(netopt_route::tune_sysctl(&profile).await?))
}

async fn rollback(
    route_backup: &netopt_common::model::RouteBackup,
    checkpoint_id: Option<&str>,
    sink: &EventSink,
) {
    match netopt_route::restore(route_backup).await {
        Ok(()) => sink.emit(&Event::ApplyRolledBack {
            reason: "apply or post-apply validation failed".to_string(),
        }),
        Err(e) => {
            tracing::error!(
                error = %e,
                checkpoint = checkpoint_id.unwrap_or("none"),
                "rollback itself failed; operator intervention required"
            );
        }
    }
}

fn persist_route_backup(
    config: &Config,
    backup: &netopt_common::model::RouteBackup,
) -> NetoptResult<()> {
    std::fs::create_dir_all(&config.state_root).map_err(NetoptError::Io)?;
    let json = serde_json::to_string_pretty(backup)
        .map_err(|e| NetoptError::Other(format!("cannot serialize route backup: {e}")))?;
    std::fs::write(config_paths::route_backup_path(&config.state_root), json)
        .map_err(NetoptError::Io)
}

/// Persist a [`netopt_common::model::ApplySummary`] to `<state_root>/state`
/// (§6) so `status` or an operator can see what the last `apply` did
/// without re-running probes.
fn persist_apply_summary(
    config: &Config,
    plan: &netopt_common::model::Plan,
    committed: bool,
    watchdog_armed: bool,
    checkpoint_id: Option<&str>,
) -> NetoptResult<()> {
    let summary = netopt_common::model::ApplySummary {
        applied_at_utc: chrono::Utc::now().to_rfc3339(),
        plan: plan.clone(),
        committed,
        watchdog_armed,
        checkpoint_id: checkpoint_id.map(str::to_string),
    };
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| NetoptError::Other(format!("cannot serialize apply summary: {e}")))?;
    std::fs::write(config_paths::apply_summary_path(&config.state_root), json)
        .map_err(NetoptError::Io)
}

/// Emit the failure event (once, at the top level) and hand the same
/// error back unchanged, so `main` still sees the original variant for
/// its exit-code mapping.
fn tag_and_return(sink: &EventSink, e: NetoptError) -> NetoptError {
    sink.emit(&Event::ApplyRolledBack {
        reason: e.to_string(),
    });
    e
}
