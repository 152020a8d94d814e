//! `CheckpointStore`: `create`/`restore`/`list`/`delete`/`prune` over a
//! directory of `<id>.tar.gz` archives (§4.7).
//!
//! Checkpoint ids follow a `prefix_<uuid7>` convention — UUIDv7 is
//! time-ordered, so FIFO retention is just a sort by id.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use netopt_common::error::{NetoptError, Result};
use netopt_common::model::CheckpointMeta;

use crate::archive::{self, CapturedFile, ExtractedCheckpoint};

/// Generate a checkpoint id: `ckpt_<uuid7>`, time-ordered like every other
/// prefixed id in this codebase.
pub fn new_checkpoint_id() -> String {
    format!("ckpt_{}", Uuid::now_v7().as_simple())
}

/// A directory of checkpoint archives, `<state_root>/checkpoints/`.
pub struct CheckpointStore {
    root: PathBuf,
    retention: usize,
}

impl CheckpointStore {
    pub fn new(state_root: impl Into<PathBuf>, retention: usize) -> Self {
        CheckpointStore {
            root: state_root.into().join("checkpoints"),
            retention,
        }
    }

    fn archive_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.tar.gz"))
    }

    /// Capture a new checkpoint from `files` (already-gathered text
    /// dumps), write it to disk, and return its id.
    pub fn create(&self, name: &str, description: &str, files: &[CapturedFile]) -> Result<String> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            NetoptError::Checkpoint(format!("cannot create checkpoint directory: {e}"))
        })?;

        let id = new_checkpoint_id();
        let meta = CheckpointMeta {
            id: id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            created_at_utc: chrono::Utc::now().to_rfc3339(),
            hostname: hostname(),
            kernel: kernel_release(),
            uid: current_uid(),
        };

        archive::write_archive(&self.archive_path(&id), &meta, files)?;
        self.prune()?;
        Ok(id)
    }

    /// Extract and integrity-check checkpoint `id`, returning the
    /// extracted directory (auto-removed on drop) for the caller to
    /// replay per §4.7's restore-scope rules.
    pub fn restore(&self, id: &str) -> Result<ExtractedCheckpoint> {
        let path = self.archive_path(id);
        if !path.exists() {
            return Err(NetoptError::Checkpoint(format!("no such checkpoint: {id}")));
        }
        archive::extract_archive(&path)
    }

    /// List every checkpoint's metadata, oldest first.
    pub fn list(&self) -> Result<Vec<CheckpointMeta>> {
        let mut entries = Vec::new();
        let Ok(read_dir) = std::fs::read_dir(&self.root) else {
            return Ok(entries);
        };
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("gz") {
                continue;
            }
            if let Ok(extracted) = archive::extract_archive(&path) {
                entries.push(extracted.meta.clone());
            }
        }
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// Delete checkpoint `id`. Deleting a missing id is an error (§4.7).
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.archive_path(id);
        if !path.exists() {
            return Err(NetoptError::Checkpoint(format!("no such checkpoint: {id}")));
        }
        std::fs::remove_file(&path)
            .map_err(|e| NetoptError::Checkpoint(format!("cannot delete {id}: {e}")))
    }

    /// Enforce FIFO retention: keep only the newest `retention`
    /// checkpoints by creation order (id is time-ordered).
    pub fn prune(&self) -> Result<()> {
        let mut ids = self.list()?;
        if ids.len() <= self.retention {
            return Ok(());
        }
        let excess = ids.len() - self.retention;
        for meta in ids.drain(..excess) {
            let _ = self.delete(&meta.id);
        }
        Ok(())
    }
}

fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn kernel_release() -> String {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn current_uid() -> u32 {
    unsafe { libc::getuid() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_files() -> Vec<CapturedFile> {
        vec![CapturedFile {
            name: "routes.txt".to_string(),
            contents: "default via 10.0.0.1 dev eth0\n".to_string(),
        }]
    }

    #[test]
    fn create_then_list_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 10);

        let id = store.create("pre-deploy", "before rollout", &sample_files()).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);

        store.delete(&id).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn delete_missing_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 10);
        assert!(store.delete("ckpt_doesnotexist").is_err());
    }

    #[test]
    fn prune_keeps_only_newest_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 2);

        for i in 0..5 {
            store
                .create(&format!("checkpoint-{i}"), "test", &sample_files())
                .unwrap();
        }
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn restore_roundtrips_captured_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), 10);
        let id = store.create("snap", "desc", &sample_files()).unwrap();

        let extracted = store.restore(&id).unwrap();
        let routes = std::fs::read_to_string(extracted.dir.join("routes.txt")).unwrap();
        assert_eq!(routes, "default via 10.0.0.1 dev eth0\n");
    }
}
