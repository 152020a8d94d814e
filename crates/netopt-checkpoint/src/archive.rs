//! Gzip-compressed tar archive format: a flat set of plain-text dumps
//! plus a top-level `metadata.json` (§4.7, §6).
//!
//! `flate2` + `tar` are the standard, widely-used pair for building a
//! gzip-tar archive in the Rust ecosystem (see DESIGN.md).

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use netopt_common::error::{NetoptError, Result};
use netopt_common::model::CheckpointMeta;

/// One named text file captured into the archive (e.g. `routes.txt`,
/// `sysctl.txt`, `tc.txt`).
pub struct CapturedFile {
    pub name: String,
    pub contents: String,
}

/// Write a new checkpoint archive at `path`: `metadata.json` plus every
/// entry in `files`, gzip-compressed tar.
pub fn write_archive(path: &Path, meta: &CheckpointMeta, files: &[CapturedFile]) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| NetoptError::Checkpoint(format!("cannot create {}: {e}", path.display())))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    let metadata_json = serde_json::to_vec_pretty(meta)
        .map_err(|e| NetoptError::Checkpoint(format!("cannot serialize metadata: {e}")))?;
    append_bytes(&mut builder, "metadata.json", &metadata_json)?;

    for captured in files {
        append_bytes(&mut builder, &captured.name, captured.contents.as_bytes())?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| NetoptError::Checkpoint(format!("tar finalize failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| NetoptError::Checkpoint(format!("gzip finalize failed: {e}")))?;
    Ok(())
}

fn append_bytes<W: Write>(builder: &mut Builder<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o600);
    header.set_cksum();
    builder
        .append_data(&mut header, name, bytes)
        .map_err(|e| NetoptError::Checkpoint(format!("cannot append {name}: {e}")))
}

/// Extract `path` into a freshly created, owner-exclusive temporary
/// directory under the OS temp root, validate that `metadata.json` is
/// present and parseable, then hand the caller the parsed metadata and
/// the extraction directory. The directory is removed on every exit path
/// (success, error, or the caller's own completion) via `RAII` — see
/// [`ExtractedCheckpoint::drop`].
pub fn extract_archive(path: &Path) -> Result<ExtractedCheckpoint> {
    let temp_root = std::env::temp_dir();
    let dir = make_owner_exclusive_temp_dir(&temp_root)?;

    let result = (|| -> Result<CheckpointMeta> {
        let file = std::fs::File::open(path).map_err(|e| {
            NetoptError::Checkpoint(format!("cannot open {}: {e}", path.display()))
        })?;
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = Archive::new(decoder);
        archive
            .unpack(&dir)
            .map_err(|e| NetoptError::Checkpoint(format!("extraction failed: {e}")))?;

        let metadata_path = dir.join("metadata.json");
        let metadata_text = std::fs::read_to_string(&metadata_path).map_err(|_| {
            NetoptError::Checkpoint("archive is missing metadata.json".to_string())
        })?;
        serde_json::from_str(&metadata_text)
            .map_err(|e| NetoptError::Checkpoint(format!("metadata.json is not parseable: {e}")))
    })();

    match result {
        Ok(meta) => Ok(ExtractedCheckpoint { dir, meta }),
        Err(e) => {
            let _ = std::fs::remove_dir_all(&dir);
            Err(e)
        }
    }
}

/// An archive successfully extracted and integrity-checked. Removes its
/// temporary directory when dropped.
pub struct ExtractedCheckpoint {
    pub dir: PathBuf,
    pub meta: CheckpointMeta,
}

impl Drop for ExtractedCheckpoint {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Create a directory under `root` that only this process's owner can
/// read/write/traverse, failing if anything at the chosen path already
/// exists (exclusive-create semantics, mirroring the transaction lock's
/// approach in `netopt-safety::lock`).
fn make_owner_exclusive_temp_dir(root: &Path) -> Result<PathBuf> {
    for attempt in 0..16 {
        let candidate = root.join(format!("netopt-checkpoint-{}-{attempt}", std::process::id()));
        match std::fs::create_dir(&candidate) {
            Ok(()) => {
                set_owner_exclusive_mode(&candidate)?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(NetoptError::Checkpoint(format!(
                    "cannot create extraction directory: {e}"
                )))
            }
        }
    }
    Err(NetoptError::Checkpoint(
        "could not allocate a unique extraction directory".to_string(),
    ))
}

#[cfg(unix)]
fn set_owner_exclusive_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| NetoptError::Checkpoint(format!("cannot chmod extraction directory: {e}")))
}

#[cfg(not(unix))]
fn set_owner_exclusive_mode(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_write_and_extract() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("checkpoint.tar.gz");
        let meta = CheckpointMeta {
            id: "abc123".to_string(),
            name: "pre-deploy".to_string(),
            description: "before rollout".to_string(),
            created_at_utc: "2026-01-01T00:00:00Z".to_string(),
            hostname: "host1".to_string(),
            kernel: "6.1.0".to_string(),
            uid: 0,
        };
        let files = vec![CapturedFile {
            name: "routes.txt".to_string(),
            contents: "default via 10.0.0.1 dev eth0\n".to_string(),
        }];

        write_archive(&archive_path, &meta, &files).unwrap();
        let extracted = extract_archive(&archive_path).unwrap();
        assert_eq!(extracted.meta.id, "abc123");
        assert!(extracted.dir.join("routes.txt").exists());
    }

    #[test]
    fn rejects_archive_missing_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("broken.tar.gz");

        let file = std::fs::File::create(&archive_path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);
        append_bytes(&mut builder, "routes.txt", b"default via 10.0.0.1\n").unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        assert!(extract_archive(&archive_path).is_err());
    }
}
