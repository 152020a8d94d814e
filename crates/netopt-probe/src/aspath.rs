//! AS-Path Intelligence (C4, optional): enrich a [`Probe`] with the AS
//! numbers a route trace passes through and whether a Tier-1 transit ASN
//! appears in that path.

use std::time::Duration;

use netopt_common::clock;
use netopt_common::model::{AsPathAnnotation, Probe};

/// Static Tier-1 transit AS set (§4.4).
const TIER1_ASNS: &[u32] = &[
    174, 701, 1299, 2914, 3257, 3356, 3491, 5511, 6453, 6461, 6762, 7018,
];

/// Enrich `probe` with AS-path data by invoking `mtr` in report mode with
/// AS lookup. Any failure (tool missing, timeout, empty result) leaves
/// `probe.as_path` as `None` rather than failing the probe (§4.4).
pub async fn annotate(mut probe: Probe) -> Probe {
    if !probe.is_alive() {
        return probe;
    }

    let gw = probe.gateway.to_string();
    let result = clock::run(
        "mtr",
        &["-z", "-b", "-r", "-c", "1", "-I", &probe.link, &gw],
        Duration::from_secs(5),
    )
    .await;

    let Ok(output) = result else {
        return probe;
    };
    if !output.status_success {
        return probe;
    }

    let as_numbers = parse_as_path(&output.stdout);
    if as_numbers.is_empty() {
        return probe;
    }

    let tier1_present = as_numbers.iter().any(|asn| TIER1_ASNS.contains(asn));
    probe.as_path = Some(AsPathAnnotation {
        as_numbers,
        tier1_present,
    });
    probe
}

/// Parse `AS174`-style tokens out of `mtr -z` report output, in trace
/// order, deduplicating consecutive repeats (a path may legitimately
/// revisit an AS after leaving it, so dedup only collapses immediate
/// repeats, not the whole set).
fn parse_as_path(report: &str) -> Vec<u32> {
    let mut out: Vec<u32> = Vec::new();
    for line in report.lines() {
        for token in line.split_whitespace() {
            let Some(digits) = token.strip_prefix("AS") else {
                continue;
            };
            let Ok(asn) = digits.trim_matches(|c: char| !c.is_ascii_digit()).parse::<u32>() else {
                continue;
            };
            if out.last() != Some(&asn) {
                out.push(asn);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_as_path_dedups_consecutive() {
        let report = "1. AS1299 10.0.0.1  0.0%  1  1.0  1.0  1.0  1.0  0.0\n\
                       2. AS1299 10.0.0.2  0.0%  1  2.0  2.0  2.0  2.0  0.0\n\
                       3. AS174 10.0.0.3  0.0%  1  3.0  3.0  3.0  3.0  0.0\n";
        assert_eq!(parse_as_path(report), vec![1299, 174]);
    }

    #[test]
    fn tier1_present_when_any_hop_matches() {
        let asns = vec![64512, 174];
        assert!(asns.iter().any(|a| TIER1_ASNS.contains(a)));
    }

    #[test]
    fn parse_as_path_empty_on_no_matches() {
        assert!(parse_as_path("no asn information here").is_empty());
    }
}
