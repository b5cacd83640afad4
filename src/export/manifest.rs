//! Manifest of files an export run created
//!
//! Stored as pretty JSON next to the files it lists, keyed by a hash of the
//! destination path. Before the next run writes anything, the old manifest
//! is compared with the new one: unchanged media files stay, everything
//! else it lists is deleted.

use crate::model::EntryId;
use crate::prompt::Prompter;
use crate::Error;
use anyhow::{Context, Result};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Allowed mtime difference between a source file and its copy
pub const MTIME_TOLERANCE_SECS: i64 = 2;

/// One file created by an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub dst: PathBuf,
    /// Copied from here; absent for generated playlists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Manifest key of a destination path
    pub fn key(dst: &Path) -> String {
        EntryId::from_line(&dst.to_string_lossy()).to_string()
    }

    /// Record a created file; `src` must exist
    pub fn insert(&mut self, dst: impl Into<PathBuf>, src: Option<&Path>) -> Result<()> {
        let dst = dst.into();
        let src = match src {
            Some(src) => Some(
                fs::canonicalize(src).map_err(|_| Error::MissingManifestSource(src.to_path_buf()))?,
            ),
            None => None,
        };
        self.entries.insert(Self::key(&dst), ManifestEntry { dst, src });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a manifest file; None if there is none
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        let manifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
        Ok(Some(manifest))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        fs::write(path, json).with_context(|| format!("Failed to write manifest: {:?}", path))?;
        log::debug!("Manifest written: {:?} ({} files)", path, self.len());
        Ok(())
    }
}

/// What the sync step did to a destination dir
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// No old manifest was found
    pub untracked: bool,
    /// Unchanged copies left in place
    pub kept_items: usize,
    pub kept_bytes: u64,
    pub deleted: usize,
    /// Old files no longer wanted
    pub orphaned: usize,
    /// Old and new entry disagree on the destination of one key
    pub mismatched: usize,
    /// Deletions that failed
    pub failed: usize,
    /// The old manifest file was removed
    pub manifest_removed: bool,
}

/// Reconcile `dir` with the manifest of the previous run
///
/// `new` holds every file this run is about to produce. Afterwards the old
/// manifest file is gone and only kept media files remain from before.
pub fn synchronize(
    dir: &Path,
    manifest_name: &str,
    new: &Manifest,
    prompter: &mut dyn Prompter,
) -> Result<SyncReport> {
    let file = dir.join(manifest_name);
    let mut report = SyncReport::default();

    let Some(old) = Manifest::load(&file)? else {
        report.untracked = true;
        if prompter.confirm("Manifest file not found! Clear export dir?")? {
            log::info!("- clearing {:?}...", dir);
            clear_dir(dir)?;
        }
        return Ok(report);
    };

    log::info!("Load manifest: {:?} ({} files)", file, old.len());

    for (key, entry) in old.entries() {
        let mut unlink = true;
        let mut size = 0;

        match new.get(key) {
            Some(next) if next.dst != entry.dst => {
                log::warn!(
                    "Manifest [Id:{}] mismatch! old {:?} != new {:?}",
                    key,
                    entry.dst,
                    next.dst
                );
                report.mismatched += 1;
            }
            Some(next) => {
                if let Some(src) = next.src.as_deref() {
                    if let Some(bytes) = unchanged_copy(src, &next.dst)? {
                        unlink = false;
                        size = bytes;
                    }
                    log::debug!(
                        "{} [Id:{}] {:?}",
                        if unlink { "Replace" } else { "Keep" },
                        key,
                        next.dst
                    );
                }
            }
            None => {
                report.orphaned += 1;
                log::debug!("Orphaned [Id:{}] {:?}", key, entry.dst);
            }
        }

        if !unlink {
            report.kept_items += 1;
            report.kept_bytes += size;
            continue;
        }

        match fs::remove_file(&entry.dst) {
            Ok(()) => report.deleted += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                log::warn!("Failed to delete {:?}: {}", entry.dst, e);
                report.failed += 1;
            }
        }
    }

    if report.deleted > 0 {
        log::info!(
            "- deleted {} previously exported files ({} orphaned)",
            report.deleted,
            report.orphaned
        );
    }

    report.manifest_removed = fs::remove_file(&file).is_ok();
    Ok(report)
}

/// Size of `dst` when it still matches `src` in size and mtime
fn unchanged_copy(src: &Path, dst: &Path) -> Result<Option<u64>> {
    if !src.is_file() || !dst.is_file() {
        return Ok(None);
    }
    let src_meta =
        fs::metadata(src).with_context(|| format!("Failed to stat source: {:?}", src))?;
    let dst_meta =
        fs::metadata(dst).with_context(|| format!("Failed to stat copy: {:?}", dst))?;

    let src_mtime = FileTime::from_last_modification_time(&src_meta);
    let dst_mtime = FileTime::from_last_modification_time(&dst_meta);
    let skew = (src_mtime.unix_seconds() - dst_mtime.unix_seconds()).abs();

    if src_meta.len() == dst_meta.len() && skew <= MTIME_TOLERANCE_SECS {
        Ok(Some(dst_meta.len()))
    } else {
        Ok(None)
    }
}

/// Delete everything inside `dir`
fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.with_context(|| format!("Failed to delete {:?}", path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use tempfile::TempDir;

    #[test]
    fn test_json_shape() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp3");
        fs::write(&src, b"abc").unwrap();

        let mut manifest = Manifest::default();
        manifest.insert("/out/pl.m3u8", None).unwrap();
        manifest.insert("/exp/x/a.mp3", Some(&src)).unwrap();

        let json: serde_json::Value = serde_json::to_value(&manifest).unwrap();
        let playlist = &json[Manifest::key(Path::new("/out/pl.m3u8"))];
        assert_eq!(playlist["dst"], "/out/pl.m3u8");
        assert!(playlist.get("src").is_none());
        assert!(json[Manifest::key(Path::new("/exp/x/a.mp3"))]["src"].is_string());

        let path = dir.path().join("export.json");
        manifest.write(&path).unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), Some(manifest));
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let err = Manifest::default()
            .insert("/exp/a.mp3", Some(Path::new("/no/such/file.mp3")))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingManifestSource(_))
        ));
    }

    #[test]
    fn test_no_manifest_asks_to_clear() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("junk.mp3"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let mut keep = ScriptedPrompter::default();
        let report = synchronize(dir.path(), "export.json", &Manifest::default(), &mut keep).unwrap();
        assert!(report.untracked);
        assert!(dir.path().join("junk.mp3").exists());

        let mut clear = ScriptedPrompter::default().with_confirms(vec![true]);
        synchronize(dir.path(), "export.json", &Manifest::default(), &mut clear).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sync_keeps_replaces_and_orphans() {
        let dir = TempDir::new().unwrap();
        let exp = dir.path().join("exp");
        fs::create_dir_all(&exp).unwrap();

        let src_same = dir.path().join("same.mp3");
        let src_changed = dir.path().join("changed.mp3");
        fs::write(&src_same, b"same").unwrap();
        fs::write(&src_changed, b"changed").unwrap();

        let dst_same = exp.join("same.mp3");
        let dst_changed = exp.join("changed.mp3");
        let dst_orphan = exp.join("orphan.mp3");
        let dst_playlist = exp.join("list.m3u8");
        fs::copy(&src_same, &dst_same).unwrap();
        fs::write(&dst_changed, b"old").unwrap();
        fs::write(&dst_orphan, b"orphan").unwrap();
        fs::write(&dst_playlist, b"x.mp3").unwrap();
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&src_same).unwrap());
        filetime::set_file_mtime(&dst_same, mtime).unwrap();

        let mut old = Manifest::default();
        old.insert(&dst_same, Some(&src_same)).unwrap();
        old.insert(&dst_changed, Some(&src_changed)).unwrap();
        old.insert(&dst_orphan, Some(&src_same)).unwrap();
        old.insert(&dst_playlist, None).unwrap();
        old.write(&exp.join("export.json")).unwrap();

        let mut new = Manifest::default();
        new.insert(&dst_same, Some(&src_same)).unwrap();
        new.insert(&dst_changed, Some(&src_changed)).unwrap();
        new.insert(&dst_playlist, None).unwrap();

        let report =
            synchronize(&exp, "export.json", &new, &mut ScriptedPrompter::default()).unwrap();

        assert_eq!(report.kept_items, 1);
        assert_eq!(report.kept_bytes, 4);
        assert_eq!(report.deleted, 3);
        assert_eq!(report.orphaned, 1);
        assert_eq!(report.failed, 0);
        assert!(report.manifest_removed);
        assert!(dst_same.exists());
        assert!(!dst_changed.exists());
        assert!(!dst_orphan.exists());
        assert!(!dst_playlist.exists());
        assert!(!exp.join("export.json").exists());
    }
}
