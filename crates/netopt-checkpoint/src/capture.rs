//! Full-system snapshot capture and the restore-scope replay described in
//! §4.7: address/route/link dumps, per-link ethtool features (best-effort),
//! `tc` state, partitioned sysctl, `lsmod` + module parameters, systemd
//! unit listing, `/proc/net/*`, and firewall rules.
//!
//! Every capture here is best-effort and synchronous, in the style of
//! `netopt-route::dns::dnsmasq_active` — a tool that isn't installed or a
//! command that fails just yields an empty or `# unavailable` entry rather
//! than aborting the whole checkpoint.

use std::process::Command;

use netopt_common::model::Link;

use crate::archive::CapturedFile;

/// Gather every snapshot section for a new checkpoint, in the order
/// `§4.7` lists them.
pub fn capture_all(links: &[Link]) -> Vec<CapturedFile> {
    let mut files = vec![
        capture_text("addresses.txt", "ip", &["-d", "addr", "show"]),
        capture_text("routes.txt", "ip", &["route", "show", "table", "all"]),
        capture_text("links.txt", "ip", &["-d", "link", "show"]),
        capture_tc(),
        capture_sysctl(),
        capture_text("lsmod.txt", "lsmod", &[]),
        capture_module_parameters(),
        capture_systemd_units(),
        capture_proc_net(),
        capture_firewall(),
    ];
    files.push(capture_ethtool(links));
    files
}

/// Run `program args` and wrap stdout (or a `# unavailable` placeholder)
/// in a named [`CapturedFile`].
fn capture_text(name: &str, program: &str, args: &[&str]) -> CapturedFile {
    let contents = run(program, args).unwrap_or_else(|| format!("# {program} unavailable\n"));
    CapturedFile {
        name: name.to_string(),
        contents,
    }
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `tc qdisc`/`class`/`filter` for every link, best-effort.
fn capture_tc() -> CapturedFile {
    let mut body = String::new();
    for section in ["qdisc", "class", "filter"] {
        body.push_str(&format!("# tc {section} show dev all\n"));
        body.push_str(&run("tc", &[section, "show"]).unwrap_or_default());
        body.push('\n');
    }
    CapturedFile {
        name: "tc.txt".to_string(),
        contents: body,
    }
}

/// Per-link `ethtool -k`/`-g`/`-c` (features/ring/coalesce), best-effort;
/// a link without ethtool support contributes an empty section rather
/// than failing the whole capture.
fn capture_ethtool(links: &[Link]) -> CapturedFile {
    let mut body = String::new();
    for link in links {
        body.push_str(&format!("## {}\n", link.name));
        for (label, args) in [
            ("features", vec!["-k", &link.name]),
            ("ring", vec!["-g", &link.name]),
            ("coalesce", vec!["-c", &link.name]),
        ] {
            body.push_str(&format!("### {label}\n"));
            body.push_str(&run("ethtool", &args).unwrap_or_else(|| "# unavailable\n".to_string()));
        }
    }
    CapturedFile {
        name: "ethtool.txt".to_string(),
        contents: body,
    }
}

/// Full sysctl dump, partitioned into the three namespaces §4.7 names
/// (`net.*`, `kernel.*`, `vm.*`) as separate sections in one file.
fn capture_sysctl() -> CapturedFile {
    let mut body = String::new();
    for prefix in ["net.", "kernel.", "vm."] {
        body.push_str(&format!("## {prefix}*\n"));
        let dump = run("sysctl", &["-a"]).unwrap_or_default();
        for line in dump.lines() {
            if line.starts_with(prefix) {
                body.push_str(line);
                body.push('\n');
            }
        }
    }
    CapturedFile {
        name: "sysctl.txt".to_string(),
        contents: body,
    }
}

/// `/sys/module/*/parameters/*`, one `module.parameter = value` line per
/// entry — `lsmod` alone only names loaded modules, not their tunables.
fn capture_module_parameters() -> CapturedFile {
    let mut body = String::new();
    if let Ok(modules) = std::fs::read_dir("/sys/module") {
        for module_entry in modules.flatten() {
            let module_name = module_entry.file_name().to_string_lossy().into_owned();
            let params_dir = module_entry.path().join("parameters");
            let Ok(params) = std::fs::read_dir(&params_dir) else {
                continue;
            };
            for param_entry in params.flatten() {
                let param_name = param_entry.file_name().to_string_lossy().into_owned();
                let value = std::fs::read_to_string(param_entry.path())
                    .unwrap_or_default();
                body.push_str(&format!("{module_name}.{param_name} = {}", value.trim()));
                body.push('\n');
            }
        }
    }
    CapturedFile {
        name: "module-parameters.txt".to_string(),
        contents: body,
    }
}

/// `systemctl status` for the handful of unit names that commonly manage
/// networking on a Linux host — whichever ones exist.
fn capture_systemd_units() -> CapturedFile {
    const KNOWN_UNITS: &[&str] = &[
        "systemd-networkd.service",
        "NetworkManager.service",
        "systemd-resolved.service",
        "dnsmasq.service",
        "wpa_supplicant.service",
    ];
    let mut body = String::new();
    for unit in KNOWN_UNITS {
        body.push_str(&format!("## {unit}\n"));
        body.push_str(
            &run("systemctl", &["status", unit, "--no-pager", "--lines", "0"])
                .unwrap_or_else(|| "# systemctl unavailable\n".to_string()),
        );
        body.push('\n');
    }
    CapturedFile {
        name: "systemd-units.txt".to_string(),
        contents: body,
    }
}

/// `/proc/net/*` statistics files, concatenated with a `## name` header
/// per file.
fn capture_proc_net() -> CapturedFile {
    let mut body = String::new();
    if let Ok(entries) = std::fs::read_dir("/proc/net") {
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        for name in names {
            let Ok(contents) = std::fs::read_to_string(format!("/proc/net/{name}")) else {
                continue;
            };
            body.push_str(&format!("## {name}\n{contents}\n"));
        }
    }
    CapturedFile {
        name: "proc-net.txt".to_string(),
        contents: body,
    }
}

/// Firewall rules from whichever of iptables-save / nftables / firewalld
/// is present on this host.
fn capture_firewall() -> CapturedFile {
    let mut body = String::new();
    if let Some(out) = run("iptables-save", &[]) {
        body.push_str("## iptables-save\n");
        body.push_str(&out);
    }
    if let Some(out) = run("nft", &["list", "ruleset"]) {
        body.push_str("## nft list ruleset\n");
        body.push_str(&out);
    }
    if let Some(out) = run("firewall-cmd", &["--list-all-zones"]) {
        body.push_str("## firewall-cmd --list-all-zones\n");
        body.push_str(&out);
    }
    if body.is_empty() {
        body.push_str("# no firewall backend detected\n");
    }
    CapturedFile {
        name: "firewall.txt".to_string(),
        contents: body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_all_produces_one_file_per_section_plus_ethtool() {
        let files = capture_all(&[]);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"addresses.txt"));
        assert!(names.contains(&"routes.txt"));
        assert!(names.contains(&"sysctl.txt"));
        assert!(names.contains(&"lsmod.txt"));
        assert!(names.contains(&"module-parameters.txt"));
        assert!(names.contains(&"systemd-units.txt"));
        assert!(names.contains(&"proc-net.txt"));
        assert!(names.contains(&"firewall.txt"));
        assert!(names.contains(&"ethtool.txt"));
    }

    #[test]
    fn capture_sysctl_partitions_by_namespace() {
        let file = capture_sysctl();
        assert!(file.contents.contains("## net.*"));
        assert!(file.contents.contains("## kernel.*"));
        assert!(file.contents.contains("## vm.*"));
    }
}
