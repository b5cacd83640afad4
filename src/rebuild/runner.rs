//! Rebuild run over one playlist or a whole Winamp catalog

use super::media::{MediaLibrary, DEFAULT_ESCAPE};
use super::resolver::{DefaultAction, Outcome, PathResolver};
use crate::model::{EntryField, Playlist, PlaylistFormat, PlaylistOptions, SaveOptions};
use crate::prompt::Prompter;
use crate::tags::Tagger;
use crate::winamp::load_catalog;
use crate::Error;
use anyhow::{Context, Result};
use encoding_rs::Encoding;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options of the `rebuild` command
#[derive(Debug, Clone)]
pub struct RebuildOptions {
    pub media: PathBuf,
    /// Escape bucket name inside `media`
    pub escape: String,
    pub sort: bool,
    /// Remove duplicates once paths are repaired
    pub dupes: bool,
    pub action: DefaultAction,
    pub backup: bool,
    /// Output format; a different one than the input forces a save
    pub format: Option<PlaylistFormat>,
    /// Save even when nothing changed
    pub force: bool,
    pub dry_run: bool,
    pub code_page: &'static Encoding,
}

impl RebuildOptions {
    pub fn new(media: impl Into<PathBuf>) -> Self {
        Self {
            media: media.into(),
            escape: DEFAULT_ESCAPE.to_string(),
            sort: false,
            dupes: false,
            action: DefaultAction::default(),
            backup: true,
            format: None,
            force: false,
            dry_run: false,
            code_page: encoding_rs::WINDOWS_1252,
        }
    }

    pub fn with_escape(mut self, escape: impl Into<String>) -> Self {
        self.escape = escape.into();
        self
    }

    pub fn with_action(mut self, action: DefaultAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_format(mut self, format: Option<PlaylistFormat>) -> Self {
        self.format = format;
        self
    }

    pub fn with_code_page(mut self, code_page: &'static Encoding) -> Self {
        self.code_page = code_page;
        self
    }
}

/// Whether the batch ran to the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStatus {
    Completed,
    /// The user picked `Exit`
    Aborted,
}

/// Counters of one playlist, or summed over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub count: usize,
    pub items: usize,
    pub moved: usize,
    pub removed: usize,
    pub duped: usize,
    pub updated: usize,
    pub erased: usize,
    pub skipped: usize,
    pub before: usize,
    pub after: usize,
}

impl RebuildSummary {
    fn add(&mut self, other: &RebuildSummary) {
        self.count += other.count;
        self.items += other.items;
        self.moved += other.moved;
        self.removed += other.removed;
        self.duped += other.duped;
        self.updated += other.updated;
        self.erased += other.erased;
        self.skipped += other.skipped;
        self.before += other.before;
        self.after += other.after;
    }
}

#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub status: RebuildStatus,
    pub total: RebuildSummary,
    /// (playlist name, counters), for every playlist finished
    pub playlists: Vec<(String, RebuildSummary)>,
}

/// Playlist name -> file for a single playlist or a `playlists.xml` catalog
pub fn playlist_sources(input: &Path) -> Result<Vec<(String, PathBuf)>> {
    let is_catalog = input
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"));

    if !is_catalog {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(vec![(name, input.to_path_buf())]);
    }

    let catalog = load_catalog(input)?;
    let mut sources = Vec::new();
    for record in &catalog.records {
        let path = catalog.playlist_path(record);
        if path.is_file() {
            sources.push((record.title(), path));
        } else {
            log::warn!("Playlist [{}] not found: {:?}", record.title(), path);
        }
    }
    Ok(sources)
}

/// Repairs playlists, carrying the resolver session across all of them
pub struct Rebuilder {
    options: RebuildOptions,
    resolver: PathResolver,
    tagger: Option<Arc<dyn Tagger>>,
}

impl Rebuilder {
    pub fn new(options: RebuildOptions) -> Result<Self> {
        let media = MediaLibrary::open(&options.media, &options.escape)?;
        let resolver = PathResolver::new(media, options.action);
        Ok(Self {
            options,
            resolver,
            tagger: None,
        })
    }

    /// Write `#EXTINF` lines with this tagger
    pub fn with_tagger(mut self, tagger: Arc<dyn Tagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Rebuild every playlist `input` names
    pub fn run(&mut self, input: &Path, prompter: &mut dyn Prompter) -> Result<RebuildReport> {
        let sources = playlist_sources(input)?;
        log::info!("Rebuilding {} playlist(s) from {:?}", sources.len(), input);

        let mut report = RebuildReport {
            status: RebuildStatus::Completed,
            total: RebuildSummary::default(),
            playlists: Vec::new(),
        };

        for (name, path) in sources {
            match self.rebuild_playlist(&name, &path, prompter) {
                Ok(Some(summary)) => {
                    report.total.add(&summary);
                    report.playlists.push((name, summary));
                }
                Ok(None) => {
                    log::warn!("User Exit");
                    report.status = RebuildStatus::Aborted;
                    break;
                }
                Err(e) => {
                    if matches!(
                        e.downcast_ref::<Error>(),
                        Some(Error::InvalidResolvedPath { .. })
                    ) {
                        return Err(e);
                    }
                    log::error!("Playlist [{}] failed: {:#}", name, e);
                }
            }
        }

        if report.playlists.len() > 1 {
            let t = &report.total;
            log::info!(
                "Summary: {} playlists, {} tracks | {} moved, {} removed, {} duped | \
                 {} before, {} after ({} updated, {} erased, {} skipped)",
                t.count,
                t.items,
                t.moved,
                t.removed,
                t.duped,
                t.before,
                t.after,
                t.updated,
                t.erased,
                t.skipped
            );
        }

        Ok(report)
    }

    /// Repair one playlist file; None when the user chose `Exit`
    pub fn rebuild_playlist(
        &mut self,
        name: &str,
        path: &Path,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<RebuildSummary>> {
        log::info!("Playlist [{}] {:?}", name, path);

        let mut options = PlaylistOptions::default()
            .with_base(self.resolver.media().root())
            .with_code_page(self.options.code_page);
        if let Some(tagger) = &self.tagger {
            options = options.with_tagger(Arc::clone(tagger));
        }

        let mut playlist = Playlist::open(path, options);
        playlist.load_with(|p| {
            log::trace!("[{}/{}] {}", p.current, p.total, p.line);
        })?;

        let before = playlist.len();
        let base = playlist.base();
        let mut skipped = 0;
        log::info!("- tracks: {}", before);

        let ids = playlist.ids().to_vec();
        for id in ids {
            let Some(entry) = playlist.get(id).cloned() else {
                continue;
            };

            match self.resolver.resolve(&entry, &base, prompter)? {
                Outcome::Skip => {
                    log::info!("- skip {:?}", entry.original);
                    playlist.reset_path(id);
                    skipped += 1;
                }
                Outcome::Remove => {
                    log::info!("- remove {:?}", entry.original);
                    playlist.remove(&[id]);
                }
                Outcome::Exit => return Ok(None),
                Outcome::Resolved(resolved) => {
                    if !resolved.is_file() {
                        return Err(Error::InvalidResolvedPath {
                            path: resolved,
                            entry: entry.original,
                        }
                        .into());
                    }
                    let resolved = std::fs::canonicalize(&resolved)
                        .with_context(|| format!("Failed to resolve {:?}", resolved))?;
                    if playlist.update_path(id, &resolved) {
                        log::info!("- update:");
                        log::info!("  <-- {:?}", entry.original);
                        log::info!("  --> {:?}", resolved);
                    }
                }
            }
        }

        if self.options.dupes {
            playlist.duplicates(true);
        }

        if self.options.sort {
            let changed = playlist.sort(EntryField::Resolved, true);
            log::info!("- sort: {}", if changed { "changed" } else { "not changed" });
        }

        let stats = playlist.stats();
        let after = playlist.len();
        let summary = RebuildSummary {
            count: 1,
            items: before,
            moved: stats.moved.len(),
            removed: stats.removed.len(),
            duped: stats.duped.len(),
            updated: stats.moved.len() + stats.removed.len() + stats.duped.len(),
            erased: before - after,
            skipped,
            before,
            after,
        };

        if !stats.removed.is_empty() {
            log::info!("- removed ({}):", stats.removed.len());
            for line in stats.removed.values() {
                log::info!("  <-- {:?}", line);
            }
        }
        if !stats.duped.is_empty() {
            log::info!("- duplicates ({}):", stats.duplicate_count());
            for key in &stats.duped {
                log::info!("  {:?} x{}", key, stats.dupes.get(key).map_or(0, Vec::len));
            }
        }

        let format_changed = self
            .options
            .format
            .is_some_and(|f| Some(f) != playlist.format());

        if playlist.is_dirty() || self.options.force || format_changed {
            let saved = playlist.save(SaveOptions {
                write: !self.options.dry_run,
                backup: self.options.backup,
                format: self.options.format,
                field: EntryField::Resolved,
            })?;
            log::info!("- saved {:?} ({} bytes)", saved.file, saved.bytes);
            if let Some(backup) = saved.backup {
                log::info!("- backup {:?}", backup);
            }
        } else {
            log::info!("- no changes");
        }

        log::info!(
            "- summary: {} moved, {} removed, {} duped | {} before, {} after ({} erased, {} skipped)",
            summary.moved,
            summary.removed,
            summary.duped,
            summary.before,
            summary.after,
            summary.erased,
            summary.skipped
        );

        Ok(Some(summary))
    }
}
