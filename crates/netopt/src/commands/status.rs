//! `netopt status` (§6, new read-only counterpart to `apply`): inventory
//! links, probe every gateway fresh, and print what the plan *would* be
//! without touching the routing table, sysctls, or DNS.

use std::sync::Arc;

use netopt_common::config::Config;
use netopt_common::error::Result;
use netopt_probe::ProbeCache;

pub async fn run(config: &Config) -> Result<i32> {
    print_last_apply(config);

    let (links, pairs) = super::inventory_with_gateways(config)?;

    if pairs.is_empty() {
        println!("no link has a discovered default gateway");
        return Ok(0);
    }

    let cache = Arc::new(ProbeCache::new(&config.cache_root));
    let opts = super::probe_opts(config);
    let results = netopt_probe::probe_batch(cache, pairs.clone(), opts).await;
    let probes: Vec<_> = results.into_values().collect();

    let plan = netopt_planner::plan(&links, &probes, config);

    println!("{:<10} {:<10} {:<16} {:>8} {:>10}", "LINK", "CLASS", "GATEWAY", "WEIGHT", "STATE");
    for link in &links {
        let Some((_, gateway)) = pairs.iter().find(|(name, _)| name == &link.name) else {
            println!(
                "{:<10} {:<10} {:<16} {:>8} {:>10}",
                link.name,
                link.class.as_str(),
                "-",
                "-",
                "no-gateway"
            );
            continue;
        };
        let entry = plan.entries.iter().find(|e| e.link == link.name);
        let (weight, state) = match entry {
            Some(e) => (e.weight.to_string(), "planned".to_string()),
            None => ("-".to_string(), "dead-or-excluded".to_string()),
        };
        println!(
            "{:<10} {:<10} {:<16} {:>8} {:>10}",
            link.name,
            link.class.as_str(),
            gateway.to_string(),
            weight,
            state
        );
    }

    if plan.is_empty() {
        println!("\nno alive gateway survived exclusion; apply would refuse to run");
    } else {
        println!("\napply would install {} next-hop(s):", plan.len());
        for entry in &plan.entries {
            println!("  {}", entry.rationale);
        }
    }

    Ok(0)
}

/// Best-effort summary of the last `apply`, read from `<state_root>/state`.
/// Absence or corruption is not an error here — `status` predates any
/// `apply` on a fresh host.
fn print_last_apply(config: &Config) {
    let path = crate::config_paths::apply_summary_path(&config.state_root);
    let Ok(text) = std::fs::read_to_string(&path) else {
        return;
    };
    match serde_json::from_str::<netopt_common::model::ApplySummary>(&text) {
        Ok(summary) => {
            let watchdog = if summary.watchdog_armed { ", watchdog armed" } else { "" };
            println!(
                "last apply: {} — {} next-hop(s), {}{}",
                summary.applied_at_utc,
                summary.plan.len(),
                if summary.committed { "committed" } else { "pending confirmation" },
                watchdog
            );
            if let Some(id) = &summary.checkpoint_id {
                println!("checkpoint: {id}");
            }
            println!();
        }
        Err(e) => tracing::debug!(error = %e, path = %path.display(), "last apply summary unreadable"),
    }
}
