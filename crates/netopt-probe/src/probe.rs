//! Probe Engine (C3): liveness gate, latency/loss/jitter sampling, and
//! optional MTU discovery for one `(link, gateway)` pair, plus concurrent
//! batch probing bounded by a `tokio::sync::Semaphore` so a host with many
//! links never spawns unbounded concurrent `ping` subprocesses.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use netopt_common::clock;
use netopt_common::model::{Probe, ProbeOutcome, ProbeSource};

use crate::cache::ProbeCache;

/// Tunables for one probe or probe_batch call, resolved from
/// [`netopt_common::config::Config`] by the caller.
#[derive(Debug, Clone)]
pub struct ProbeOpts {
    pub ping_count: u32,
    pub ping_timeout: Duration,
    pub probe_jumbo: bool,
    pub cache_ttl: Duration,
    pub parallel_timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for ProbeOpts {
    fn default() -> Self {
        ProbeOpts {
            ping_count: 2,
            ping_timeout: Duration::from_millis(1000),
            probe_jumbo: false,
            cache_ttl: Duration::from_secs(60),
            parallel_timeout: Duration::from_secs(5),
            max_concurrency: 4,
        }
    }
}

/// Probe `(link, gateway)`, consulting `cache` first.
pub async fn probe(
    cache: &ProbeCache,
    link: &str,
    gateway: Ipv4Addr,
    opts: &ProbeOpts,
) -> Probe {
    let gw_str = gateway.to_string();
    if let Some(entry) = cache.get_fresh(link, &gw_str, opts.cache_ttl) {
        let outcome = match entry {
            crate::cache::CacheEntry::Alive { latency_ms, .. } => ProbeOutcome::Alive {
                latency_ms,
                jitter_ms: None,
                loss_pct: 0.0,
                mtu: None,
            },
            crate::cache::CacheEntry::Dead { .. } => ProbeOutcome::Dead { loss_pct: 100.0 },
        };
        return Probe {
            link: link.to_string(),
            gateway,
            outcome,
            measured_at: Duration::from_secs(0),
            source: ProbeSource::Cached,
            as_path: None,
        };
    }

    let start = clock::now();
    let outcome = measure(link, gateway, opts).await;
    let measured_at = start.elapsed();

    let _ = cache.put(link, &gw_str, &outcome);

    Probe {
        link: link.to_string(),
        gateway,
        outcome,
        measured_at,
        source: ProbeSource::Fresh,
        as_path: None,
    }
}

/// Probe every `(link, gateway)` pair concurrently, bounded by
/// `opts.max_concurrency` and an overall `opts.parallel_timeout` deadline.
/// Probes still in flight when the deadline elapses are recorded as
/// unreachable, `source = fresh` (§4.3).
pub async fn probe_batch(
    cache: Arc<ProbeCache>,
    pairs: Vec<(String, Ipv4Addr)>,
    opts: ProbeOpts,
) -> HashMap<String, Probe> {
    let semaphore = Arc::new(Semaphore::new(opts.max_concurrency.max(1)));
    let opts = Arc::new(opts);
    let expected: Vec<(String, Ipv4Addr)> = pairs.clone();

    let tasks: Vec<_> = pairs
        .into_iter()
        .map(|(link, gateway)| {
            let cache = Arc::clone(&cache);
            let semaphore = Arc::clone(&semaphore);
            let opts = Arc::clone(&opts);
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let probe = probe(&cache, &link, gateway, &opts).await;
                (link, probe)
            })
        })
        .collect();

    let mut results = HashMap::new();
    let deadline = opts.parallel_timeout;
    let joined = tokio::time::timeout(deadline, join_handles(tasks)).await;

    if let Ok(outcomes) = joined {
        for outcome in outcomes {
            if let Ok((link, probe)) = outcome {
                results.insert(link, probe);
            }
        }
    }

    // Whatever didn't finish before the batch deadline — dropped handles on
    // timeout, or an individual task panic — is recorded as unreachable
    // rather than silently missing from the result map.
    for (link, gateway) in expected {
        results.entry(link.clone()).or_insert_with(|| Probe {
            link,
            gateway,
            outcome: ProbeOutcome::Dead { loss_pct: 100.0 },
            measured_at: deadline,
            source: ProbeSource::Fresh,
            as_path: None,
        });
    }

    results
}

/// Await every spawned probe handle in turn, tolerating individual task
/// failures (panics inside a probe don't abort the batch).
async fn join_handles(
    tasks: Vec<tokio::task::JoinHandle<(String, Probe)>>,
) -> Vec<Result<(String, Probe), tokio::task::JoinError>> {
    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        out.push(task.await);
    }
    out
}

async fn measure(link: &str, gateway: Ipv4Addr, opts: &ProbeOpts) -> ProbeOutcome {
    let gw = gateway.to_string();

    // 1. Liveness gate: one echo, 1s deadline.
    let liveness = clock::run(
        "ping",
        &["-c", "1", "-W", "1", "-I", link, &gw],
        Duration::from_secs(1),
    )
    .await;
    let alive = matches!(&liveness, Ok(out) if out.status_success);
    if !alive {
        return ProbeOutcome::Dead { loss_pct: 100.0 };
    }

    // 2. Latency/loss sample over N echoes.
    let count = opts.ping_count.max(1);
    let timeout_secs = opts.ping_timeout.as_secs_f64().max(1.0) as u64;
    let sample = clock::run(
        "ping",
        &[
            "-c",
            &count.to_string(),
            "-i",
            "0.2",
            "-W",
            &timeout_secs.to_string(),
            "-I",
            link,
            &gw,
        ],
        opts.ping_timeout + Duration::from_millis(200) * count,
    )
    .await;

    let rtts = sample
        .as_ref()
        .map(|out| parse_ping_rtts(&out.stdout))
        .unwrap_or_default();

    if rtts.is_empty() {
        return ProbeOutcome::Dead { loss_pct: 100.0 };
    }

    let successes = rtts.len() as f64;
    let loss_pct = ((count as f64 - successes) / count as f64) * 100.0;
    let mean = rtts.iter().sum::<f64>() / successes;

    // 3. Jitter: population stddev of success RTTs, when sample size >= 2.
    let jitter_ms = if rtts.len() >= 2 {
        let variance = rtts.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / successes;
        Some(variance.sqrt())
    } else {
        None
    };

    // 4. Optional MTU binary search.
    let mtu = if opts.probe_jumbo {
        discover_mtu(link, &gw, 576, 9000).await
    } else {
        discover_mtu(link, &gw, 576, 1500).await
    };

    ProbeOutcome::Alive {
        latency_ms: mean,
        jitter_ms,
        loss_pct,
        mtu,
    }
}

/// Binary search the largest MTU in `[lo, hi]` for which three consecutive
/// `ping -M do` probes (payload = mtu - 28) all succeed.
async fn discover_mtu(link: &str, gateway: &str, lo: u32, hi: u32) -> Option<u32> {
    let mut low = lo;
    let mut high = hi;
    let mut best = None;

    while low <= high {
        let mid = low + (high - low) / 2;
        let payload = mid.saturating_sub(28).to_string();
        let mut all_ok = true;
        for _ in 0..3 {
            let result = clock::run(
                "ping",
                &[
                    "-c", "1", "-W", "1", "-M", "do", "-s", &payload, "-I", link, gateway,
                ],
                Duration::from_secs(1),
            )
            .await;
            if !matches!(result, Ok(out) if out.status_success) {
                all_ok = false;
                break;
            }
        }
        if all_ok {
            best = Some(mid);
            low = mid + 1;
        } else {
            if mid == 0 {
                break;
            }
            high = mid - 1;
        }
    }
    best
}

/// Parse `time=NN.N ms` occurrences out of `ping` stdout, in order.
fn parse_ping_rtts(stdout: &str) -> Vec<f64> {
    stdout
        .lines()
        .filter_map(|line| {
            let idx = line.find("time=")?;
            let rest = &line[idx + "time=".len()..];
            let end = rest.find(' ').unwrap_or(rest.len());
            rest[..end].parse::<f64>().ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ping_rtts_extracts_times() {
        let stdout = "64 bytes from 1.1.1.1: icmp_seq=1 ttl=56 time=11.2 ms\n\
                       64 bytes from 1.1.1.1: icmp_seq=2 ttl=56 time=12.8 ms\n";
        let rtts = parse_ping_rtts(stdout);
        assert_eq!(rtts, vec![11.2, 12.8]);
    }

    #[test]
    fn parse_ping_rtts_empty_on_no_replies() {
        let stdout = "PING 1.1.1.1 (1.1.1.1): 56 data bytes\n\
                       --- 1.1.1.1 ping statistics ---\n\
                       2 packets transmitted, 0 packets received, 100% packet loss\n";
        assert!(parse_ping_rtts(stdout).is_empty());
    }
}
