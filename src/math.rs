//! Playlist arithmetic: `a - b` and `a + b`

use crate::model::{EntryField, Playlist, PlaylistFormat, PlaylistOptions, SaveOptions, SaveReport};
use crate::tags::Tagger;
use crate::Error;
use anyhow::{bail, Result};
use encoding_rs::Encoding;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathMethod {
    /// Entries of A missing from B
    #[default]
    Sub,
    /// `a - b`, then all of B
    Add,
}

impl FromStr for MathMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sub" => Ok(MathMethod::Sub),
            "add" => Ok(MathMethod::Add),
            _ => bail!("Method \"{}\" not implemented! Use: add|sub", s),
        }
    }
}

impl fmt::Display for MathMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MathMethod::Sub => "-",
            MathMethod::Add => "+",
        })
    }
}

#[derive(Clone)]
pub struct MathOptions {
    pub method: MathMethod,
    pub sort: bool,
    pub backup: bool,
    pub dry_run: bool,
    pub code_page: &'static Encoding,
    pub tagger: Option<Arc<dyn Tagger>>,
}

impl Default for MathOptions {
    fn default() -> Self {
        Self {
            method: MathMethod::default(),
            sort: false,
            backup: true,
            dry_run: false,
            code_page: encoding_rs::WINDOWS_1252,
            tagger: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathReport {
    pub a: usize,
    pub b: usize,
    pub out: usize,
    pub saved: SaveReport,
}

fn check_type(path: &Path) -> Result<()> {
    if PlaylistFormat::from_path(path).is_none() {
        return Err(Error::UnsupportedPlaylistType {
            path: path.to_path_buf(),
            ext: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
            supported: PlaylistFormat::supported_list(),
        }
        .into());
    }
    Ok(())
}

fn original_lines(path: &Path, code_page: &'static Encoding) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(Error::MissingPlaylistFile(path.to_path_buf()).into());
    }
    let mut playlist = Playlist::open(path, PlaylistOptions::default().with_code_page(code_page));
    playlist.load()?;
    Ok(playlist.values(EntryField::Original))
}

/// Combine playlists A and B into `out`, keeping the original line texts
pub fn run(a: &Path, b: &Path, out: &Path, options: &MathOptions) -> Result<MathReport> {
    for path in [a, b, out] {
        check_type(path)?;
    }

    log::info!(
        "Math playlists: [{}] {} [{}] = [{}]",
        a.display(),
        options.method,
        b.display(),
        out.display()
    );

    let lines_a = original_lines(a, options.code_page)?;
    let lines_b = original_lines(b, options.code_page)?;

    let mut lines: Vec<&String> = lines_a.iter().filter(|l| !lines_b.contains(l)).collect();
    if options.method == MathMethod::Add {
        lines.extend(lines_b.iter());
    }

    let mut playlist_options = PlaylistOptions::default().with_code_page(options.code_page);
    if let Some(tagger) = &options.tagger {
        playlist_options = playlist_options.with_tagger(Arc::clone(tagger));
    }
    let mut playlist = Playlist::open(out, playlist_options);
    playlist.insert(lines, true);

    let (count_a, count_b, count_out) = (lines_a.len(), lines_b.len(), playlist.len());
    match options.method {
        MathMethod::Add => log::info!("{} + {} = {}", count_a, count_b, count_out),
        MathMethod::Sub => log::info!(
            "{} - {} ({}) = {}",
            count_a,
            count_a - count_out,
            count_b,
            count_out
        ),
    }

    if options.sort && playlist.sort(EntryField::Original, true) {
        log::info!("- sort");
    }

    let saved = playlist.save(SaveOptions {
        write: !options.dry_run,
        backup: options.backup,
        format: None,
        field: EntryField::Original,
    })?;
    log::info!("- saved {:?}", saved.file);
    if let Some(backup) = &saved.backup {
        log::info!("- back  {:?}", backup);
    }

    Ok(MathReport {
        a: count_a,
        b: count_b,
        out: count_out,
        saved,
    })
}
