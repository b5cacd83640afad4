//! Winamp media library catalog (`playlists.xml`)
//!
//! Lists the user playlists Winamp knows about, and renders the listing
//! printed by the `show` command.

mod catalog;
mod model;

pub use catalog::{load_catalog, parse_catalog, Catalog};
pub use model::{time_string, AttrValue, CatalogRecord, CatalogSummary, ShowFormat, SortKey};

/// Text rows of the `show` listing, header first
pub fn render_listing(catalog: &Catalog, format: ShowFormat) -> Vec<String> {
    let mut rows = Vec::with_capacity(catalog.records.len() + 1);

    match format {
        ShowFormat::Formatted => {
            let width = catalog
                .records
                .iter()
                .map(|r| r.title().chars().count())
                .max()
                .unwrap_or(0)
                .max("Playlist".len());
            rows.push(format!("{:<width$} | {:>6} | {:>12}", "Playlist", "Songs", "Duration"));
            for record in &catalog.records {
                rows.push(format!(
                    "{:<width$} | {:>6} | {:>12}",
                    record.title(),
                    record.songs(),
                    time_string(record.seconds())
                ));
            }
        }
        ShowFormat::Raw => {
            let lp_width = catalog.records.len().to_string().len();
            let keys: Vec<&str> = catalog
                .records
                .first()
                .map(|r| r.attributes.iter().map(|(k, _)| k.as_str()).collect())
                .unwrap_or_default();
            rows.push(format!(
                "{:>lp_width$} | On | {}",
                "Lp",
                keys.join(" | ")
            ));
            for (i, record) in catalog.records.iter().enumerate() {
                let on = if catalog.playlist_path(record).exists() {
                    '+'
                } else {
                    ' '
                };
                let values: Vec<String> = record
                    .attributes
                    .iter()
                    .map(|(_, v)| v.to_string())
                    .collect();
                rows.push(format!(
                    "{:>lp_width$} | {}  | {}",
                    i + 1,
                    on,
                    values.join(" | ")
                ));
            }
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_listing_marks_files_on_disk() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.m3u8"), "x.mp3\n").unwrap();
        let catalog = Catalog {
            dir: dir.path().to_path_buf(),
            records: parse_catalog(
                r#"<playlists>
                <playlist filename="a.m3u8" title="A" songs="1" seconds="61"/>
                <playlist filename="b.m3u8" title="B" songs="2" seconds="7200"/>
                </playlists>"#,
            )
            .unwrap(),
        };

        let raw = render_listing(&catalog, ShowFormat::Raw);
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0], "Lp | On | filename | title | songs | seconds");
        assert_eq!(raw[1], "1 | +  | a.m3u8 | A | 1 | 61");
        assert!(raw[2].starts_with("2 |    | b.m3u8"));

        let formatted = render_listing(&catalog, ShowFormat::Formatted);
        assert!(formatted[1].ends_with("0:01:01"));
        assert!(formatted[2].ends_with("2:00:00"));

        let summary = CatalogSummary::of(&catalog.records);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.songs, 3);
        assert_eq!(summary.seconds, 7261);
    }
}
