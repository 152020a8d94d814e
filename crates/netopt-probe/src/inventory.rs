//! Interface Inventory (C2): enumerate kernel network interfaces, classify
//! them, and discover each link's default gateway.
//!
//! Enumeration reads `/sys/class/net` directly — sysfs is the stable,
//! dependency-free place to learn about links without shelling out.

use std::net::Ipv4Addr;

use regex::Regex;

use netopt_common::error::{NetoptError, Result};
use netopt_common::model::{Link, LinkClass};

const EXCLUDE_PATTERN: &str = r"^lo$|^docker|^veth|^br-|^virbr";

/// List every link eligible for planning: exclusion filter applied, then
/// classified, admin-down links omitted.
///
/// `extra_exclude` is the operator-supplied `EXCLUDE_INTERFACES` regex
/// (config key), applied in addition to the built-in filter.
pub fn list(extra_exclude: Option<&str>) -> Result<Vec<Link>> {
    let exclude = Regex::new(EXCLUDE_PATTERN).expect("static regex is valid");
    let extra = extra_exclude
        .map(Regex::new)
        .transpose()
        .map_err(|e| NetoptError::Config(format!("invalid EXCLUDE_INTERFACES regex: {e}")))?;

    let net_dir = std::fs::read_dir("/sys/class/net").map_err(|e| {
        NetoptError::Inventory(format!("cannot read /sys/class/net: {e}"))
    })?;

    let mut links = Vec::new();
    for entry in net_dir.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if exclude.is_match(&name) {
            continue;
        }
        if let Some(extra) = &extra {
            if extra.is_match(&name) {
                continue;
            }
        }

        let admin_up = read_admin_up(&name);
        if !admin_up {
            continue;
        }

        links.push(Link {
            class: classify(&name),
            carrier: read_carrier(&name),
            mac: read_sysfs_string(&name, "address"),
            mtu: read_sysfs_number(&name, "mtu"),
            speed_mbps: read_sysfs_number(&name, "speed"),
            admin_up,
            name,
        });
    }

    Ok(links)
}

/// Classification policy (§4.2) — order matters, first match wins.
fn classify(name: &str) -> LinkClass {
    if sysfs_path_exists(name, "wireless") || sysfs_path_exists(name, "phy80211") {
        return LinkClass::Wifi;
    }
    if Regex::new(r"^(wl|wlan)").unwrap().is_match(name) {
        return LinkClass::Wifi;
    }
    if Regex::new(r"^(ppp|wwan|wwp|usb)").unwrap().is_match(name) {
        return LinkClass::Mobile;
    }
    let is_ethernet_type = read_sysfs_number(name, "type") == Some(1);
    if Regex::new(r"^(en|eth)").unwrap().is_match(name) && is_ethernet_type {
        return LinkClass::Ethernet;
    }
    if is_ethernet_type {
        return LinkClass::Ethernet;
    }
    LinkClass::Unknown
}

/// Discover `link`'s default-route gateway by scanning the kernel routing
/// table scoped to that interface. Returns `None` when no default route
/// exists for it — such links cannot participate in planning.
pub fn gateway(link: &str) -> Result<Option<Ipv4Addr>> {
    let route_table = std::fs::read_to_string("/proc/net/route").map_err(|e| {
        NetoptError::Inventory(format!("cannot read /proc/net/route: {e}"))
    })?;

    for line in route_table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        let iface = fields[0];
        let destination = fields[1];
        let gateway_hex = fields[2];
        if iface != link || destination != "00000000" {
            continue;
        }
        if let Some(addr) = parse_hex_le_ipv4(gateway_hex) {
            return Ok(Some(addr));
        }
    }
    Ok(None)
}

/// `/proc/net/route` stores addresses as little-endian hex.
fn parse_hex_le_ipv4(hex: &str) -> Option<Ipv4Addr> {
    let value = u32::from_str_radix(hex, 16).ok()?;
    if value == 0 {
        return None;
    }
    let bytes = value.to_le_bytes();
    Some(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
}

fn read_admin_up(name: &str) -> bool {
    read_sysfs_string(name, "operstate")
        .map(|s| s != "down")
        .unwrap_or(false)
        || read_flags_up(name)
}

/// `operstate` reads `unknown` for some virtual/ppp links even when the
/// link is administratively up; fall back to the `IFF_UP` bit in `flags`.
fn read_flags_up(name: &str) -> bool {
    read_sysfs_string(name, "flags")
        .and_then(|s| u32::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .map(|flags| flags & 0x1 != 0)
        .unwrap_or(false)
}

fn read_carrier(name: &str) -> bool {
    read_sysfs_string(name, "carrier")
        .map(|s| s.trim() == "1")
        .unwrap_or(false)
}

fn sysfs_path_exists(name: &str, leaf: &str) -> bool {
    std::path::Path::new(&format!("/sys/class/net/{name}/{leaf}")).exists()
}

fn read_sysfs_string(name: &str, leaf: &str) -> Option<String> {
    std::fs::read_to_string(format!("/sys/class/net/{name}/{leaf}"))
        .ok()
        .map(|s| s.trim().to_string())
}

fn read_sysfs_number<T: std::str::FromStr>(name: &str, leaf: &str) -> Option<T> {
    read_sysfs_string(name, leaf).and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_wlan_as_wifi() {
        // classify() only consults the filesystem for the wireless/type
        // checks after the name-pattern checks fail, so wlan0 resolves
        // purely from its name regardless of sysfs state.
        assert_eq!(classify("wlan0"), LinkClass::Wifi);
    }

    #[test]
    fn classify_wwan_as_mobile() {
        assert_eq!(classify("wwan0"), LinkClass::Mobile);
    }

    #[test]
    fn classify_unknown_interface_without_sysfs_falls_back() {
        assert_eq!(classify("tun-nonexistent-xyz"), LinkClass::Unknown);
    }

    #[test]
    fn parse_hex_le_ipv4_decodes_route_table_gateway() {
        // 0x0101A8C0 little-endian = 192.168.1.1
        let addr = parse_hex_le_ipv4("0101A8C0").unwrap();
        assert_eq!(addr, Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn parse_hex_le_ipv4_rejects_zero() {
        assert!(parse_hex_le_ipv4("00000000").is_none());
    }
}
