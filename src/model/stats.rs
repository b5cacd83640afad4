use super::track::EntryId;
use std::collections::BTreeMap;

/// Per-playlist bookkeeping of what happened to its entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistStats {
    /// Duplicated keys (line text on insert, resolved path on dedup) in discovery order
    pub duped: Vec<String>,

    /// Duplicated key -> ids of the entries that repeated it
    pub dupes: BTreeMap<String, Vec<EntryId>>,

    /// Entries whose path changed -> new path
    pub moved: BTreeMap<EntryId, String>,

    /// Removed entries -> original line
    pub removed: BTreeMap<EntryId, String>,

    /// Entries that failed to resolve on insert -> original line
    pub missing: BTreeMap<EntryId, String>,
}

impl PlaylistStats {
    pub(crate) fn add_dupes(&mut self, found: Vec<(String, Vec<EntryId>)>) {
        for (key, ids) in found {
            if !self.dupes.contains_key(&key) {
                self.duped.push(key.clone());
            }
            self.dupes.entry(key).or_default().extend(ids);
        }
    }

    /// Number of entries found duplicating another one
    pub fn duplicate_count(&self) -> usize {
        self.dupes.values().map(Vec::len).sum()
    }
}
