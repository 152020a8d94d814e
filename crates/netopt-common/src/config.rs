//! Layered configuration loader.
//!
//! Mirrors the `*ConfigInput` / `resolve()` split used throughout the
//! bonding stack's `rist-bonding-core::config`: an all-`Option<T>` input
//! struct deserializes whatever subset of keys a given layer provides, and
//! `resolve()` folds a stack of layers down to a concrete [`Config`] against
//! compiled defaults. Precedence (lowest to highest): compiled defaults <
//! system config file < user config file < `NETOPT_*` environment < CLI
//! flags.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{NetoptError, Result};

/// All configuration keys this program recognizes, as a flat `Option<T>`
/// bag. Every field is optional so a layer can supply only the keys it
/// cares about; [`ConfigInput::resolve`] fills the rest from defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigInput {
    pub priority_ethernet: Option<u32>,
    pub priority_wifi: Option<u32>,
    pub priority_mobile: Option<u32>,
    pub priority_unknown: Option<u32>,

    pub max_latency: Option<f64>,
    pub min_weight: Option<u32>,
    pub max_weight: Option<u32>,
    pub latency_divisor: Option<f64>,
    pub loss_exclude_pct: Option<f64>,

    pub ping_count: Option<u32>,
    pub ping_timeout: Option<u64>,
    pub probe_jumbo: Option<bool>,
    pub cache_ttl: Option<u64>,
    pub parallel_timeout: Option<u64>,
    pub max_concurrency: Option<usize>,

    pub enable_bgp: Option<bool>,
    pub enable_checkpoints: Option<bool>,
    pub checkpoint_retention: Option<usize>,
    pub enable_watchdog: Option<bool>,
    pub watchdog_timeout: Option<u64>,
    pub max_watchdog_extend: Option<u64>,

    pub tcp_congestion_control: Option<String>,
    pub tcp_fastopen: Option<u32>,
    pub rmem_max: Option<u64>,
    pub wmem_max: Option<u64>,

    pub dns_servers: Option<Vec<String>>,
    pub exclude_interfaces: Option<String>,

    pub state_root: Option<PathBuf>,
    pub cache_root: Option<PathBuf>,
}

/// A resolved configuration: every key has a concrete value.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub priority_ethernet: u32,
    pub priority_wifi: u32,
    pub priority_mobile: u32,
    pub priority_unknown: u32,

    pub max_latency: f64,
    pub min_weight: u32,
    pub max_weight: u32,
    pub latency_divisor: f64,
    pub loss_exclude_pct: f64,

    pub ping_count: u32,
    pub ping_timeout: u64,
    pub probe_jumbo: bool,
    pub cache_ttl: u64,
    pub parallel_timeout: u64,
    pub max_concurrency: usize,

    pub enable_bgp: bool,
    pub enable_checkpoints: bool,
    pub checkpoint_retention: usize,
    pub enable_watchdog: bool,
    pub watchdog_timeout: u64,
    pub max_watchdog_extend: u64,

    pub tcp_congestion_control: Option<String>,
    pub tcp_fastopen: Option<u32>,
    pub rmem_max: Option<u64>,
    pub wmem_max: Option<u64>,

    pub dns_servers: Vec<String>,
    pub exclude_interfaces: Option<String>,

    pub state_root: PathBuf,
    pub cache_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            priority_ethernet: 0,
            priority_wifi: 1,
            priority_mobile: 2,
            priority_unknown: 3,

            max_latency: 200.0,
            min_weight: 1,
            max_weight: 20,
            latency_divisor: 10.0,
            loss_exclude_pct: 75.0,

            ping_count: 2,
            ping_timeout: 1000,
            probe_jumbo: false,
            cache_ttl: 60,
            parallel_timeout: 5,
            max_concurrency: 4,

            enable_bgp: false,
            enable_checkpoints: true,
            checkpoint_retention: 10,
            enable_watchdog: true,
            watchdog_timeout: 300,
            max_watchdog_extend: 1800,

            tcp_congestion_control: None,
            tcp_fastopen: None,
            rmem_max: None,
            wmem_max: None,

            dns_servers: Vec::new(),
            exclude_interfaces: None,

            state_root: PathBuf::from("/var/lib/netopt"),
            cache_root: PathBuf::from("/var/lib/netopt/cache"),
        }
    }
}

impl ConfigInput {
    /// Parse a TOML document into an input layer. An empty/whitespace-only
    /// document parses to an all-`None` layer rather than an error.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(ConfigInput::default());
        }
        toml::from_str(input).map_err(|e| NetoptError::Config(format!("invalid config TOML: {e}")))
    }

    /// Build an input layer from `NETOPT_*` environment variables.
    pub fn from_env(vars: impl Iterator<Item = (String, String)>) -> Self {
        let mut map = HashMap::new();
        for (k, v) in vars {
            if let Some(key) = k.strip_prefix("NETOPT_") {
                map.insert(key.to_ascii_lowercase(), v);
            }
        }
        let mut out = ConfigInput::default();
        macro_rules! parse_num {
            ($field:ident) => {
                if let Some(v) = map.get(stringify!($field)) {
                    out.$field = v.parse().ok();
                }
            };
        }
        macro_rules! parse_bool {
            ($field:ident) => {
                if let Some(v) = map.get(stringify!($field)) {
                    out.$field = parse_bool_str(v);
                }
            };
        }
        parse_num!(priority_ethernet);
        parse_num!(priority_wifi);
        parse_num!(priority_mobile);
        parse_num!(priority_unknown);
        parse_num!(max_latency);
        parse_num!(min_weight);
        parse_num!(max_weight);
        parse_num!(latency_divisor);
        parse_num!(loss_exclude_pct);
        parse_num!(ping_count);
        parse_num!(ping_timeout);
        parse_bool!(probe_jumbo);
        parse_num!(cache_ttl);
        parse_num!(parallel_timeout);
        parse_num!(max_concurrency);
        parse_bool!(enable_bgp);
        parse_bool!(enable_checkpoints);
        parse_num!(checkpoint_retention);
        parse_bool!(enable_watchdog);
        parse_num!(watchdog_timeout);
        parse_num!(max_watchdog_extend);
        if let Some(v) = map.get("tcp_congestion_control") {
            out.tcp_congestion_control = Some(v.clone());
        }
        parse_num!(tcp_fastopen);
        parse_num!(rmem_max);
        parse_num!(wmem_max);
        if let Some(v) = map.get("dns_servers") {
            out.dns_servers = Some(v.split(',').map(|s| s.trim().to_string()).collect());
        }
        if let Some(v) = map.get("exclude_interfaces") {
            out.exclude_interfaces = Some(v.clone());
        }
        out
    }

    /// Merge `other` on top of `self` — fields set in `other` win.
    pub fn merge(self, other: ConfigInput) -> ConfigInput {
        ConfigInput {
            priority_ethernet: other.priority_ethernet.or(self.priority_ethernet),
            priority_wifi: other.priority_wifi.or(self.priority_wifi),
            priority_mobile: other.priority_mobile.or(self.priority_mobile),
            priority_unknown: other.priority_unknown.or(self.priority_unknown),
            max_latency: other.max_latency.or(self.max_latency),
            min_weight: other.min_weight.or(self.min_weight),
            max_weight: other.max_weight.or(self.max_weight),
            latency_divisor: other.latency_divisor.or(self.latency_divisor),
            loss_exclude_pct: other.loss_exclude_pct.or(self.loss_exclude_pct),
            ping_count: other.ping_count.or(self.ping_count),
            ping_timeout: other.ping_timeout.or(self.ping_timeout),
            probe_jumbo: other.probe_jumbo.or(self.probe_jumbo),
            cache_ttl: other.cache_ttl.or(self.cache_ttl),
            parallel_timeout: other.parallel_timeout.or(self.parallel_timeout),
            max_concurrency: other.max_concurrency.or(self.max_concurrency),
            enable_bgp: other.enable_bgp.or(self.enable_bgp),
            enable_checkpoints: other.enable_checkpoints.or(self.enable_checkpoints),
            checkpoint_retention: other.checkpoint_retention.or(self.checkpoint_retention),
            enable_watchdog: other.enable_watchdog.or(self.enable_watchdog),
            watchdog_timeout: other.watchdog_timeout.or(self.watchdog_timeout),
            max_watchdog_extend: other.max_watchdog_extend.or(self.max_watchdog_extend),
            tcp_congestion_control: other.tcp_congestion_control.or(self.tcp_congestion_control),
            tcp_fastopen: other.tcp_fastopen.or(self.tcp_fastopen),
            rmem_max: other.rmem_max.or(self.rmem_max),
            wmem_max: other.wmem_max.or(self.wmem_max),
            dns_servers: other.dns_servers.or(self.dns_servers),
            exclude_interfaces: other.exclude_interfaces.or(self.exclude_interfaces),
            state_root: other.state_root.or(self.state_root),
            cache_root: other.cache_root.or(self.cache_root),
        }
    }

    /// Fold this layer down to a concrete [`Config`], filling unset keys
    /// from compiled defaults and validating cross-field invariants.
    pub fn resolve(self) -> Result<Config> {
        let defaults = Config::default();
        let min_weight = self.min_weight.unwrap_or(defaults.min_weight);
        let max_weight = self.max_weight.unwrap_or(defaults.max_weight);
        if min_weight > max_weight {
            return Err(NetoptError::Config(format!(
                "min_weight ({min_weight}) must not exceed max_weight ({max_weight})"
            )));
        }

        let state_root = self.state_root.unwrap_or(defaults.state_root);
        let cache_root = self
            .cache_root
            .unwrap_or_else(|| state_root.join("cache"));

        Ok(Config {
            priority_ethernet: self.priority_ethernet.unwrap_or(defaults.priority_ethernet),
            priority_wifi: self.priority_wifi.unwrap_or(defaults.priority_wifi),
            priority_mobile: self.priority_mobile.unwrap_or(defaults.priority_mobile),
            priority_unknown: self.priority_unknown.unwrap_or(defaults.priority_unknown),
            max_latency: self.max_latency.unwrap_or(defaults.max_latency),
            min_weight,
            max_weight,
            latency_divisor: self.latency_divisor.unwrap_or(defaults.latency_divisor),
            loss_exclude_pct: self.loss_exclude_pct.unwrap_or(defaults.loss_exclude_pct),
            ping_count: self.ping_count.unwrap_or(defaults.ping_count).max(1),
            ping_timeout: self.ping_timeout.unwrap_or(defaults.ping_timeout),
            probe_jumbo: self.probe_jumbo.unwrap_or(defaults.probe_jumbo),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            parallel_timeout: self.parallel_timeout.unwrap_or(defaults.parallel_timeout),
            max_concurrency: self
                .max_concurrency
                .unwrap_or(defaults.max_concurrency)
                .max(1),
            enable_bgp: self.enable_bgp.unwrap_or(defaults.enable_bgp),
            enable_checkpoints: self
                .enable_checkpoints
                .unwrap_or(defaults.enable_checkpoints),
            checkpoint_retention: self
                .checkpoint_retention
                .unwrap_or(defaults.checkpoint_retention),
            enable_watchdog: self.enable_watchdog.unwrap_or(defaults.enable_watchdog),
            watchdog_timeout: self.watchdog_timeout.unwrap_or(defaults.watchdog_timeout),
            max_watchdog_extend: self
                .max_watchdog_extend
                .unwrap_or(defaults.max_watchdog_extend),
            tcp_congestion_control: self.tcp_congestion_control,
            tcp_fastopen: self.tcp_fastopen,
            rmem_max: self.rmem_max,
            wmem_max: self.wmem_max,
            dns_servers: self.dns_servers.unwrap_or(defaults.dns_servers),
            exclude_interfaces: self.exclude_interfaces,
            state_root,
            cache_root,
        })
    }
}

fn parse_bool_str(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load and merge the full layer stack: compiled defaults, system config
/// file, user config file, `NETOPT_*` environment, then an optional
/// CLI-supplied overlay — in that precedence order — and resolve.
pub fn load(
    system_config_path: &Path,
    user_config_path: &Path,
    env: impl Iterator<Item = (String, String)>,
    cli_overlay: Option<ConfigInput>,
) -> Result<Config> {
    let mut layer = ConfigInput::default();

    if let Ok(text) = std::fs::read_to_string(system_config_path) {
        layer = layer.merge(ConfigInput::from_toml_str(&text)?);
    }
    if let Ok(text) = std::fs::read_to_string(user_config_path) {
        layer = layer.merge(ConfigInput::from_toml_str(&text)?);
    }
    layer = layer.merge(ConfigInput::from_env(env));
    if let Some(cli) = cli_overlay {
        layer = layer.merge(cli);
    }

    layer.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_resolves_to_defaults() {
        let cfg = ConfigInput::default().resolve().unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn toml_layer_overrides_defaults() {
        let input = ConfigInput::from_toml_str(
            r#"
            max_latency = 150.0
            ping_count = 4
            dns_servers = ["1.1.1.1", "8.8.8.8"]
            "#,
        )
        .unwrap();
        let cfg = input.resolve().unwrap();
        assert_eq!(cfg.max_latency, 150.0);
        assert_eq!(cfg.ping_count, 4);
        assert_eq!(cfg.dns_servers, vec!["1.1.1.1", "8.8.8.8"]);
        assert_eq!(cfg.min_weight, Config::default().min_weight);
    }

    #[test]
    fn env_layer_wins_over_file_layer() {
        let file = ConfigInput::from_toml_str("max_latency = 150.0").unwrap();
        let env = ConfigInput::from_env(
            vec![("NETOPT_MAX_LATENCY".to_string(), "90".to_string())].into_iter(),
        );
        let merged = file.merge(env);
        let cfg = merged.resolve().unwrap();
        assert_eq!(cfg.max_latency, 90.0);
    }

    #[test]
    fn rejects_inverted_weight_bounds() {
        let mut input = ConfigInput::default();
        input.min_weight = Some(10);
        input.max_weight = Some(5);
        assert!(input.resolve().is_err());
    }

    #[test]
    fn cache_root_defaults_under_state_root() {
        let mut input = ConfigInput::default();
        input.state_root = Some(PathBuf::from("/tmp/netopt-state"));
        let cfg = input.resolve().unwrap();
        assert_eq!(cfg.cache_root, PathBuf::from("/tmp/netopt-state/cache"));
    }
}
