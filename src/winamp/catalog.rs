//! Winamp `playlists.xml` reader
//!
//! Winamp writes the file as UTF-16 with a BOM; hand-edited copies are often
//! UTF-8. Both are decoded before parsing.

use super::model::{AttrValue, CatalogRecord, SortKey};
use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::path::{Path, PathBuf};

/// Playlists listed in a Winamp catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Directory playlist file names are relative to
    pub dir: PathBuf,
    pub records: Vec<CatalogRecord>,
}

impl Catalog {
    /// Full path of a record's playlist file
    pub fn playlist_path(&self, record: &CatalogRecord) -> PathBuf {
        self.dir.join(record.filename())
    }

    /// First record with this exact title
    pub fn find_title(&self, title: &str) -> Option<&CatalogRecord> {
        self.records.iter().find(|r| r.title() == title)
    }

    /// Reorder records; `Lp` keeps file order (reversed when descending)
    pub fn sort(&mut self, key: SortKey, ascending: bool) {
        match key.attribute() {
            None => {
                if !ascending {
                    self.records.reverse();
                }
            }
            Some(attr) => {
                self.records.sort_by(|a, b| {
                    let ord = a.get(attr).cmp(&b.get(attr));
                    if ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                });
            }
        }
    }
}

/// Read a catalog file
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    log::debug!("Loading Winamp catalog {:?}", path);

    let bytes =
        fs::read(path).with_context(|| format!("Failed to read Winamp playlists: {:?}", path))?;

    // BOM sniffing switches to UTF-16 when present
    let (text, _, had_errors) = encoding_rs::UTF_8.decode(&bytes);
    if had_errors {
        log::warn!("Invalid characters replaced while decoding {:?}", path);
    }

    let records =
        parse_catalog(&text).with_context(|| format!("Failed to parse Winamp playlists: {:?}", path))?;

    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    log::debug!("Found {} playlists in catalog", records.len());
    Ok(Catalog { dir, records })
}

/// Parse catalog XML text into records
pub fn parse_catalog(xml: &str) -> Result<Vec<CatalogRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"playlist" => {
                let mut record = CatalogRecord::default();
                for attr in e.attributes() {
                    let attr = attr.context("Malformed playlist attribute")?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .with_context(|| format!("Malformed value of attribute {:?}", key))?;
                    let value = AttrValue::parse(&key, &value);
                    record.attributes.push((key, value));
                }
                records.push(record);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "XML error at position {}: {:?}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    Ok(records)
}
