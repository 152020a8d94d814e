//! Probe cache: one plaintext file per `(link, gateway)` key under
//! `cache_root`, keyed by `{link}_{gateway-slug}` (§6). File mtime is the
//! freshness timestamp; contents are either a decimal millisecond latency
//! or the literal token `DEAD`.
//!
//! This is the one of the two pieces of shared mutable state called out in
//! §5 ("the probe cache, mutex-protected, TTL-swept"); the in-process
//! mutex here only serializes concurrent probes *within this process* —
//! cross-process safety comes from the write being a rename into place,
//! so a reader never observes a half-written file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use netopt_common::model::ProbeOutcome;

const DEAD_TOKEN: &str = "DEAD";

/// File-backed probe cache rooted at `cache_root`.
pub struct ProbeCache {
    root: PathBuf,
    // Guards read-then-write sequences so two probes for the same key
    // racing within this process don't interleave partial writes; it does
    // not protect against another netopt process, which relies on the
    // rename-into-place atomicity instead.
    write_lock: Mutex<()>,
}

/// What the cache holds for one key: either a latency sample or a cached
/// dead marker, alongside how long ago it was captured.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Alive { latency_ms: f64, age: Duration },
    Dead { age: Duration },
}

impl ProbeCache {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        ProbeCache {
            root: cache_root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, link: &str, gateway: &str) -> PathBuf {
        let slug = gateway.replace([':', '.'], "-");
        self.root.join(format!("{link}_{slug}"))
    }

    /// Look up `(link, gateway)`. Returns `None` on a cache miss (no file,
    /// unreadable, or unparseable contents) — callers treat that the same
    /// as an expired entry.
    pub fn get(&self, link: &str, gateway: &str) -> Option<CacheEntry> {
        let path = self.path_for(link, gateway);
        let metadata = std::fs::metadata(&path).ok()?;
        let modified = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        let contents = std::fs::read_to_string(&path).ok()?;
        let trimmed = contents.trim();

        if trimmed == DEAD_TOKEN {
            return Some(CacheEntry::Dead { age });
        }
        let latency_ms: f64 = trimmed.parse().ok()?;
        Some(CacheEntry::Alive { latency_ms, age })
    }

    /// Returns `Some` only when the entry exists and is younger than `ttl`.
    pub fn get_fresh(&self, link: &str, gateway: &str, ttl: Duration) -> Option<CacheEntry> {
        match self.get(link, gateway)? {
            CacheEntry::Alive { latency_ms, age } if age < ttl => {
                Some(CacheEntry::Alive { latency_ms, age })
            }
            CacheEntry::Dead { age } if age < ttl => Some(CacheEntry::Dead { age }),
            _ => None,
        }
    }

    /// Record `outcome` for `(link, gateway)`. Dead outcomes are cached
    /// identically to alive ones (§4.3) so a dead secondary doesn't get
    /// re-probed every cycle.
    pub fn put(&self, link: &str, gateway: &str, outcome: &ProbeOutcome) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(link, gateway);
        let body = match outcome {
            ProbeOutcome::Alive { latency_ms, .. } => format!("{latency_ms:.3}"),
            ProbeOutcome::Dead { .. } => DEAD_TOKEN.to_string(),
        };
        write_atomic(&path, &body)
    }
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProbeCache::new(dir.path());
        assert!(cache.get("wan0", "192.168.1.1").is_none());
    }

    #[test]
    fn roundtrip_alive_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProbeCache::new(dir.path());
        let outcome = ProbeOutcome::Alive {
            latency_ms: 12.5,
            jitter_ms: None,
            loss_pct: 0.0,
            mtu: None,
        };
        cache.put("wan0", "192.168.1.1", &outcome).unwrap();
        match cache.get("wan0", "192.168.1.1").unwrap() {
            CacheEntry::Alive { latency_ms, .. } => assert_eq!(latency_ms, 12.5),
            other => panic!("expected Alive, got {other:?}"),
        }
    }

    #[test]
    fn roundtrip_dead_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProbeCache::new(dir.path());
        let outcome = ProbeOutcome::Dead { loss_pct: 100.0 };
        cache.put("wan1", "10.0.0.1", &outcome).unwrap();
        assert!(matches!(
            cache.get("wan1", "10.0.0.1").unwrap(),
            CacheEntry::Dead { .. }
        ));
    }

    #[test]
    fn expired_entry_is_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProbeCache::new(dir.path());
        let outcome = ProbeOutcome::Dead { loss_pct: 100.0 };
        cache.put("wan2", "10.0.0.2", &outcome).unwrap();
        assert!(cache
            .get_fresh("wan2", "10.0.0.2", Duration::from_secs(0))
            .is_none());
    }
}
