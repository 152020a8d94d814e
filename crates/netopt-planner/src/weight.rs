//! Weight formula, exclusion filter, and tie-break ordering (§4.5).

use netopt_common::config::Config;
use netopt_common::model::{Link, LinkClass, Plan, PlanEntry, Probe};

/// Class multiplier applied to the base weight before re-clamping.
fn class_multiplier(class: LinkClass) -> f64 {
    match class {
        LinkClass::Ethernet => 2.0,
        LinkClass::Wifi => 1.0,
        LinkClass::Mobile => 0.5,
        LinkClass::Unknown => 1.0,
    }
}

fn class_priority(class: LinkClass, config: &Config) -> u32 {
    match class {
        LinkClass::Ethernet => config.priority_ethernet,
        LinkClass::Wifi => config.priority_wifi,
        LinkClass::Mobile => config.priority_mobile,
        LinkClass::Unknown => config.priority_unknown,
    }
}

/// Build a [`Plan`] from `links` (for classification) and their matching
/// `probes`. Probes with no matching link, dead probes, or probes whose
/// loss exceeds `LOSS_EXCLUDE_PCT` are dropped (§4.5 Exclusions).
pub fn plan(links: &[Link], probes: &[Probe], config: &Config) -> Plan {
    let mut entries: Vec<PlanEntry> = Vec::new();

    for probe in probes {
        let Some(link) = links.iter().find(|l| l.name == probe.link) else {
            continue;
        };
        if !probe.is_alive() {
            continue;
        }
        if probe.outcome.loss_pct() >= config.loss_exclude_pct {
            continue;
        }
        let Some(latency_ms) = probe.outcome.latency_ms() else {
            continue;
        };

        let base = clamp(
            (config.max_latency - latency_ms) / config.latency_divisor,
            config.min_weight as f64,
            config.max_weight as f64,
        );

        let multiplier = class_multiplier(link.class);
        let weighted = clamp(
            base * multiplier,
            config.min_weight as f64,
            (config.max_weight * 2) as f64,
        )
        .trunc();

        let final_weight = if config.enable_bgp {
            if let Some(annotation) = &probe.as_path {
                let bgp_bonus =
                    (100.0 - annotation.hop_count() as f64 * 5.0).max(0.0)
                        + if annotation.tier1_present { 20.0 } else { 0.0 };
                clamp(
                    (0.7 * weighted + 0.3 * (bgp_bonus / 5.0)).round(),
                    1.0,
                    40.0,
                )
            } else {
                weighted
            }
        } else {
            weighted
        };

        let weight = (final_weight.max(1.0)) as u32;

        let rationale = format!(
            "{}: {} {:.1}ms \u{d7}{:.1} \u{2192} w={}",
            link.name,
            link.class.as_str(),
            latency_ms,
            multiplier,
            weight
        );

        entries.push(PlanEntry {
            link: link.name.clone(),
            gateway: probe.gateway,
            class: link.class,
            weight,
            probe: probe.clone(),
            rationale,
        });
    }

    entries.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| class_priority(a.class, config).cmp(&class_priority(b.class, config)))
            .then_with(|| a.link.cmp(&b.link))
    });

    Plan { entries }
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netopt_common::model::{AsPathAnnotation, ProbeOutcome, ProbeSource};
    use std::net::Ipv4Addr;

    fn link(name: &str, class: LinkClass) -> Link {
        Link {
            name: name.to_string(),
            class,
            admin_up: true,
            carrier: true,
            mac: None,
            mtu: None,
            speed_mbps: None,
        }
    }

    fn alive_probe(link: &str, latency_ms: f64, loss_pct: f64) -> Probe {
        Probe {
            link: link.to_string(),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            outcome: ProbeOutcome::Alive {
                latency_ms,
                jitter_ms: None,
                loss_pct,
                mtu: None,
            },
            measured_at: std::time::Duration::from_millis(10),
            source: ProbeSource::Fresh,
            as_path: None,
        }
    }

    #[test]
    fn ethernet_beats_wifi_at_similar_latency() {
        let links = vec![link("eth0", LinkClass::Ethernet), link("wlan0", LinkClass::Wifi)];
        let probes = vec![alive_probe("eth0", 17.0, 0.0), alive_probe("wlan0", 17.0, 0.0)];
        let config = Config::default();
        let plan = plan(&links, &probes, &config);
        assert_eq!(plan.entries[0].link, "eth0");
        assert!(plan.entries[0].weight > plan.entries[1].weight);
    }

    #[test]
    fn high_loss_probe_is_excluded() {
        let links = vec![link("wwan0", LinkClass::Mobile)];
        let probes = vec![alive_probe("wwan0", 50.0, 80.0)];
        let config = Config::default();
        let plan = plan(&links, &probes, &config);
        assert!(plan.is_empty());
    }

    #[test]
    fn dead_probe_is_excluded() {
        let links = vec![link("eth0", LinkClass::Ethernet)];
        let dead = Probe {
            link: "eth0".to_string(),
            gateway: Ipv4Addr::new(10, 0, 0, 1),
            outcome: ProbeOutcome::Dead { loss_pct: 100.0 },
            measured_at: std::time::Duration::from_millis(10),
            source: ProbeSource::Fresh,
            as_path: None,
        };
        let config = Config::default();
        let plan = plan(&links, &[dead], &config);
        assert!(plan.is_empty());
    }

    #[test]
    fn weight_never_rounds_to_zero() {
        let links = vec![link("wwan0", LinkClass::Mobile)];
        // latency near MAX_LATENCY makes base clamp to MIN_WEIGHT (1),
        // multiplied by 0.5 would be 0 before the floor.
        let probes = vec![alive_probe("wwan0", 199.0, 0.0)];
        let config = Config::default();
        let plan = plan(&links, &probes, &config);
        assert_eq!(plan.entries[0].weight, 1);
    }

    #[test]
    fn tie_break_falls_back_to_link_name() {
        let links = vec![link("wlan1", LinkClass::Wifi), link("wlan0", LinkClass::Wifi)];
        let probes = vec![alive_probe("wlan1", 20.0, 0.0), alive_probe("wlan0", 20.0, 0.0)];
        let config = Config::default();
        let plan = plan(&links, &probes, &config);
        assert_eq!(plan.entries[0].link, "wlan0");
        assert_eq!(plan.entries[1].link, "wlan1");
    }

    #[test]
    fn bgp_blend_applies_when_enabled_and_annotated() {
        let links = vec![link("eth0", LinkClass::Ethernet)];
        let mut probe = alive_probe("eth0", 17.0, 0.0);
        probe.as_path = Some(AsPathAnnotation {
            as_numbers: vec![174, 701],
            tier1_present: true,
        });
        let mut config = Config::default();
        config.enable_bgp = true;
        let plan = plan(&links, &[probe], &config);
        assert_eq!(plan.entries.len(), 1);
        assert!(plan.entries[0].weight <= 40);
    }

    #[test]
    fn rationale_string_matches_expected_shape() {
        let links = vec![link("en0", LinkClass::Ethernet)];
        let probes = vec![alive_probe("en0", 2.3, 0.0)];
        let config = Config::default();
        let plan = plan(&links, &probes, &config);
        assert!(plan.entries[0].rationale.starts_with("en0: ethernet 2.3ms"));
    }
}
