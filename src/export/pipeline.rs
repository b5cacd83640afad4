//! Export run: budgeted playlists, generated output, synced media copy

use super::budget::{Admission, Budget, ExportStats};
use super::config::{format_bytes, ExportConfig, PlaylistJob};
use super::manifest::{synchronize, Manifest, SyncReport};
use super::organizer::{copy_track, ExportLayout};
use crate::model::{EntryField, EntryId, Playlist, PlaylistOptions};
use crate::prompt::Prompter;
use crate::winamp::{load_catalog, time_string};
use crate::{Error, APP_NAME, APP_VERSION};
use anyhow::{Context, Result};
use encoding_rs::Encoding;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Outcome of an export run
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub stats: ExportStats,
    /// (playlist name, tracks written) for every playlist taken
    pub tracks: Vec<(String, usize)>,
    /// Playlists skipped for lack of space
    pub skipped: Vec<String>,
    /// Playlist files written, all-tracks playlist last
    pub playlists: Vec<PathBuf>,
    /// Media files copied this run
    pub copied: usize,
    pub output_sync: SyncReport,
    pub export_sync: Option<SyncReport>,
}

/// A loaded playlist and its definition
struct Loaded {
    job: PlaylistJob,
    playlist: Playlist,
}

/// Everything collected while loading playlists
struct Collected {
    loaded: Vec<Loaded>,
    all: Playlist,
    budget: Budget,
    media: Manifest,
    skipped: Vec<String>,
}

/// Main export pipeline
pub struct ExportPipeline {
    config: ExportConfig,
    layout: ExportLayout,
    code_page: &'static Encoding,
    dry_run: bool,
}

impl ExportPipeline {
    pub fn new(config: ExportConfig) -> Result<Self> {
        if !config.winamp_dir.is_dir() {
            return Err(Error::MissingDirectory {
                what: "Winamp ML".to_string(),
                path: config.winamp_dir.clone(),
            }
            .into());
        }
        let layout = ExportLayout::new(&config);
        Ok(Self {
            config,
            layout,
            code_page: encoding_rs::WINDOWS_1252,
            dry_run: false,
        })
    }

    pub fn with_code_page(mut self, code_page: &'static Encoding) -> Self {
        self.code_page = code_page;
        self
    }

    /// Load and budget only; nothing is written
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Playlists in processing order: extras (by title) first, then configured ones
    pub fn jobs(&self) -> Result<Vec<PlaylistJob>> {
        let mut jobs = self.extra_jobs()?;
        jobs.extend(self.config.playlists.iter().map(PlaylistJob::from_def));
        Ok(jobs)
    }

    fn extra_jobs(&self) -> Result<Vec<PlaylistJob>> {
        let mut titles: Vec<&str> = Vec::new();
        for title in &self.config.extra {
            if !titles.contains(&title.as_str()) {
                titles.push(title);
            }
        }
        if titles.is_empty() {
            return Ok(Vec::new());
        }

        let catalog = load_catalog(&self.config.catalog_path())?;
        let mut jobs = Vec::new();
        let mut missing = Vec::new();

        for title in titles {
            match catalog.find_title(title) {
                Some(record) => jobs.push(PlaylistJob::extra(title, &record.filename())),
                None => missing.push(title.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(Error::UnknownPlaylistTitles(missing).into());
        }
        Ok(jobs)
    }

    /// Run the complete export
    pub fn run(&self, prompter: &mut dyn Prompter) -> Result<ExportReport> {
        log::info!("{}", self.config.title);

        let limit = self.config.total_size.bytes()?;
        log::info!(
            "Total size set: {}",
            if limit == 0 {
                "no limit".to_string()
            } else {
                format_bytes(limit)
            }
        );

        if !self.dry_run {
            self.layout.prepare(self.config.auto_dirs)?;
        }

        // Step 1: load playlists under the size limit
        let mut collected = self.collect(limit)?;
        let stats = collected.budget.stats();

        log::info!(
            "Playlist [{}] - all tracks summary",
            self.config.playlist_all
        );
        log::info!(
            "Total tracks: {} ({} dupes) | total size: {} | ~{} per track",
            stats.unique_items,
            stats.duplicates,
            format_bytes(stats.total_bytes),
            format_bytes(stats.average_bytes as u64)
        );

        let mut report = ExportReport {
            stats,
            tracks: collected
                .loaded
                .iter()
                .map(|l| (l.job.name.clone(), l.playlist.len()))
                .collect(),
            skipped: collected.skipped.clone(),
            ..ExportReport::default()
        };

        if self.dry_run {
            log::info!("Dry run: nothing written");
            return Ok(report);
        }

        // Step 2: generated playlists
        let (files, output_sync) = self.write_output(&mut collected, prompter)?;
        report.playlists = files;
        report.output_sync = output_sync;

        // Step 3: media files
        if let Some(dir) = self.layout.export_dir() {
            let (copied, sync) = self.export_media(dir, &collected.media, &stats, prompter)?;
            report.copied = copied;
            report.export_sync = Some(sync);
        }

        log::info!("Done.");
        Ok(report)
    }

    fn collect(&self, limit: u64) -> Result<Collected> {
        let mut collected = Collected {
            loaded: Vec::new(),
            all: Playlist::default(),
            budget: Budget::new(limit),
            media: Manifest::default(),
            skipped: Vec::new(),
        };

        for job in self.jobs()? {
            match self.load_playlist(&job, &mut collected)? {
                Some(playlist) => collected.loaded.push(Loaded { job, playlist }),
                None => collected.skipped.push(job.name),
            }
        }

        collected.budget.verify()?;
        Ok(collected)
    }

    /// Load one playlist and account its tracks; None if there was no room
    fn load_playlist(&self, job: &PlaylistJob, collected: &mut Collected) -> Result<Option<Playlist>> {
        let file = self.config.winamp_dir.join(&job.file);
        log::info!("Playlist [{}] {:?}", job.name, file);

        if !file.is_file() {
            return Err(Error::MissingPlaylistFile(file).into());
        }

        let budget = &mut collected.budget;
        if job.budgeted && !budget.has_room() {
            log::info!(
                "- skipped! Less than {} left (total size limit: {})",
                format_bytes(budget.stats().average_bytes as u64),
                format_bytes(budget.limit())
            );
            return Ok(None);
        }

        let mut playlist = Playlist::open(
            &file,
            PlaylistOptions::default().with_code_page(self.code_page),
        );
        playlist.load_with(|p| log::trace!("[{}/{}] {}", p.current, p.total, p.line))?;
        log::info!("- found: {} tracks", playlist.len());

        if job.shuffle {
            log::info!("- shuffle...");
            playlist.shuffle();
        }

        if job.limit > 0 && playlist.reduce(job.limit) {
            log::info!("- reduced to {} tracks (user limit)", playlist.len());
        }

        let mut done = 0;
        for id in playlist.ids().to_vec() {
            let Some(entry) = playlist.get(id).cloned() else {
                continue;
            };
            let missing = || Error::MissingTrack {
                playlist: job.name.clone(),
                entry: entry.original.clone(),
            };
            let source = entry.resolved.clone().ok_or_else(missing)?;
            let source_text = source.to_string_lossy().into_owned();

            let line = self.layout.track_line(&source);
            playlist.set_mapped(id, line.clone());

            let admission = budget.admit(EntryId::from_line(&source_text), job.budgeted, || {
                let meta = fs::metadata(&source).map_err(|_| missing())?;
                Ok(meta.len())
            })?;

            match admission {
                Admission::Duplicate => {}
                Admission::OverBudget => {
                    playlist.reduce(done);
                    log::info!(
                        "- reduced to {} tracks (total size limit: {})",
                        done,
                        format_bytes(budget.limit())
                    );
                    break;
                }
                Admission::Accepted => {
                    if let Some(all_id) = collected.all.insert_line(&source_text, false) {
                        collected.all.set_mapped(all_id, line);
                    }
                    if let Some(dst) = self.layout.destination(&source) {
                        collected.media.insert(dst, Some(&source))?;
                    }
                }
            }
            done += 1;
        }

        let stats = budget.stats();
        log::info!(
            "Total tracks: {} | total size: {} | ~{} per track",
            stats.unique_items,
            format_bytes(stats.total_bytes),
            format_bytes(stats.average_bytes as u64)
        );

        Ok(Some(playlist))
    }

    /// Replace the previous run's playlists with fresh ones
    fn write_output(
        &self,
        collected: &mut Collected,
        prompter: &mut dyn Prompter,
    ) -> Result<(Vec<PathBuf>, SyncReport)> {
        let dir = self.layout.output_dir();
        log::info!("Output dir: {:?}", dir);

        // generated names are not known up front, so every old one goes
        let sync = synchronize(dir, &self.config.manifest, &Manifest::default(), prompter)?;

        let mut manifest = Manifest::default();
        let mut files = Vec::new();

        for loaded in &mut collected.loaded {
            for name in loaded.job.output_names() {
                if loaded.job.shuffle {
                    loaded.playlist.shuffle();
                }
                let file = self.layout.playlist_file(&name);
                self.write_playlist(&loaded.job.name, &loaded.playlist, loaded.job.shuffle, &file)?;
                manifest.insert(&file, None)?;
                files.push(file);
            }
        }

        let file = self.layout.playlist_file(&self.config.playlist_all);
        self.write_playlist(&self.config.playlist_all, &collected.all, false, &file)?;
        manifest.insert(&file, None)?;
        files.push(file);

        manifest.write(&dir.join(&self.config.manifest))?;
        Ok((files, sync))
    }

    fn write_playlist(&self, name: &str, playlist: &Playlist, shuffled: bool, file: &Path) -> Result<()> {
        let mut text = self.header(name, file, playlist.len(), shuffled);
        for line in playlist.values(EntryField::Mapped) {
            text.push_str(&line);
            text.push('\n');
        }
        fs::write(file, text).with_context(|| format!("Failed to write playlist: {:?}", file))?;
        log::info!("Save [{}] {:?}", name, file);
        Ok(())
    }

    fn header(&self, name: &str, file: &Path, tracks: usize, shuffled: bool) -> String {
        let base = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "# {}\n# {} v{}\n# {}\n# Playlist: {} | {} | {} tracks | shuffled: {}\n\n",
            self.config.title,
            APP_NAME,
            APP_VERSION,
            chrono::Local::now().to_rfc2822(),
            name,
            base,
            tracks,
            if shuffled { "yes" } else { "no" }
        )
    }

    /// Sync the export dir, then copy whatever is not there yet
    fn export_media(
        &self,
        dir: &Path,
        media: &Manifest,
        stats: &ExportStats,
        prompter: &mut dyn Prompter,
    ) -> Result<(usize, SyncReport)> {
        log::info!("Export dir: {:?}", dir);
        let sync = synchronize(dir, &self.config.manifest, media, prompter)?;
        if sync.kept_items > 0 {
            log::info!(
                "- saved {} by not exporting {} matched files.",
                format_bytes(sync.kept_bytes),
                sync.kept_items
            );
        }

        // written before copying: an interrupted run still knows its files
        media.write(&dir.join(&self.config.manifest))?;

        let items = stats.unique_items.saturating_sub(sync.kept_items);
        let bytes = stats.total_bytes.saturating_sub(sync.kept_bytes);
        log::info!("Export {} tracks | {}", items, format_bytes(bytes));

        let mut progress = CopyProgress::new(items, bytes);
        for (_, entry) in media.entries() {
            if entry.dst.is_file() {
                continue;
            }
            let Some(src) = entry.src.as_deref() else {
                continue;
            };
            let copied = copy_track(src, &entry.dst)?;
            progress.advance(copied, &entry.dst);
        }

        Ok((progress.files, sync))
    }
}

/// Copy progress: percent done, time left, average speed
struct CopyProgress {
    start: Instant,
    items: usize,
    bytes: u64,
    files: usize,
    done: u64,
}

impl CopyProgress {
    fn new(items: usize, bytes: u64) -> Self {
        Self {
            start: Instant::now(),
            items,
            bytes,
            files: 0,
            done: 0,
        }
    }

    fn advance(&mut self, copied: u64, dst: &Path) {
        self.files += 1;
        self.done += copied;

        let percent = if self.bytes == 0 {
            100.0
        } else {
            (self.done as f64 / self.bytes as f64 * 100.0).min(100.0)
        };
        let elapsed = self.start.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            self.done as f64 / elapsed
        } else {
            0.0
        };
        let left = if speed > 0.0 {
            (self.bytes.saturating_sub(self.done) as f64 / speed) as i64
        } else {
            0
        };

        log::info!(
            "- copying [{}/{}] [{:.0}%] {} left at {}/s - {}",
            self.files,
            self.items,
            percent.floor(),
            time_string(left),
            format_bytes(speed as u64),
            dst.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
    }
}
