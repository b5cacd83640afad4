//! Records of the Winamp playlist catalog

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::bail;

/// Attribute value: `title` and non-numeric values stay text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Text(String),
    Int(i64),
}

impl AttrValue {
    /// Coerce a raw attribute unless it is the title
    pub fn parse(key: &str, raw: &str) -> Self {
        if key == "title" {
            return AttrValue::Text(raw.to_string());
        }
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return AttrValue::Int(n);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && !trimmed.is_empty() => AttrValue::Int(f as i64),
            _ => AttrValue::Text(raw.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            AttrValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Int(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Int(n) => write!(f, "{n}"),
        }
    }
}

impl PartialOrd for AttrValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AttrValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (AttrValue::Int(a), AttrValue::Int(b)) => a.cmp(b),
            (AttrValue::Text(a), AttrValue::Text(b)) => a.cmp(b),
            (AttrValue::Int(_), AttrValue::Text(_)) => Ordering::Less,
            (AttrValue::Text(_), AttrValue::Int(_)) => Ordering::Greater,
        }
    }
}

/// One `<playlist>` element, attributes in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRecord {
    pub attributes: Vec<(String, AttrValue)>,
}

impl CatalogRecord {
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn text(&self, key: &str) -> String {
        self.get(key).map(|v| v.to_string()).unwrap_or_default()
    }

    fn int(&self, key: &str) -> i64 {
        self.get(key).and_then(AttrValue::as_int).unwrap_or(0)
    }

    /// Playlist file name, relative to the catalog directory
    pub fn filename(&self) -> String {
        self.text("filename")
    }

    pub fn title(&self) -> String {
        self.text("title")
    }

    pub fn id(&self) -> String {
        self.text("id")
    }

    pub fn songs(&self) -> i64 {
        self.int("songs")
    }

    pub fn seconds(&self) -> i64 {
        self.int("seconds")
    }
}

/// Column the `show` listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Catalog file order
    #[default]
    Lp,
    Filename,
    Title,
    Id,
    Songs,
    Seconds,
}

impl SortKey {
    pub fn attribute(&self) -> Option<&'static str> {
        match self {
            SortKey::Lp => None,
            SortKey::Filename => Some("filename"),
            SortKey::Title => Some("title"),
            SortKey::Id => Some("id"),
            SortKey::Songs => Some("songs"),
            SortKey::Seconds => Some("seconds"),
        }
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "lp" => SortKey::Lp,
            "filename" => SortKey::Filename,
            "title" => SortKey::Title,
            "id" => SortKey::Id,
            "songs" => SortKey::Songs,
            "seconds" => SortKey::Seconds,
            _ => bail!(
                "Unknown sort key \"{}\". Use: lp|filename|title|id|songs|seconds",
                s
            ),
        })
    }
}

/// `show` output flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowFormat {
    #[default]
    Raw,
    Formatted,
}

impl FromStr for ShowFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "raw" => ShowFormat::Raw,
            "formatted" | "formated" => ShowFormat::Formatted,
            _ => bail!("Unknown format \"{}\". Use: raw|formatted", s),
        })
    }
}

/// Totals over a catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub count: usize,
    pub songs: i64,
    pub seconds: i64,
}

impl CatalogSummary {
    pub fn of(records: &[CatalogRecord]) -> Self {
        records.iter().fold(Self::default(), |mut s, r| {
            s.count += 1;
            s.songs += r.songs();
            s.seconds += r.seconds();
            s
        })
    }
}

/// `H:MM:SS`, with a day count once it gets that long
pub fn time_string(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (d, rest) = (seconds / 86_400, seconds % 86_400);
    let (h, m, s) = (rest / 3600, rest % 3600 / 60, rest % 60);
    if d > 0 {
        format!("{d}d {h}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}:{s:02}")
    }
}
