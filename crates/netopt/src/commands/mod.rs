//! Command handlers, one module per CLI verb, each taking a resolved
//! [`netopt_common::config::Config`] and returning the same typed
//! [`netopt_common::error::Result`] the library crates use — `main` only
//! needs to print the error and map it through [`NetoptError::exit_code`]
//! at the very top.
//!
//! [`NetoptError::exit_code`]: netopt_common::error::NetoptError::exit_code

pub mod apply;
pub mod checkpoint;
pub mod restore;
pub mod status;
pub mod watchdog;

use std::net::Ipv4Addr;
use std::time::Duration;

use netopt_common::config::Config;
use netopt_common::model::Link;
use netopt_probe::ProbeOpts;

/// Build [`ProbeOpts`] from a resolved [`Config`].
pub fn probe_opts(config: &Config) -> ProbeOpts {
    ProbeOpts {
        ping_count: config.ping_count,
        ping_timeout: Duration::from_millis(config.ping_timeout),
        probe_jumbo: config.probe_jumbo,
        cache_ttl: Duration::from_secs(config.cache_ttl),
        parallel_timeout: Duration::from_secs(config.parallel_timeout),
        max_concurrency: config.max_concurrency,
    }
}

/// Enumerate eligible links and resolve each one's gateway, dropping any
/// link without a default route of its own (§4.2: "such links are
/// excluded from planning").
pub fn inventory_with_gateways(
    config: &Config,
) -> netopt_common::error::Result<(Vec<Link>, Vec<(String, Ipv4Addr)>)> {
    let links = netopt_probe::list(config.exclude_interfaces.as_deref())?;
    let mut pairs = Vec::new();
    for link in &links {
        if let Some(gateway) = netopt_probe::gateway(&link.name)? {
            pairs.push((link.name.clone(), gateway));
        }
    }
    Ok((links, pairs))
}
