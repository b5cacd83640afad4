//! Unique track set under a total size limit

use crate::model::EntryId;
use crate::Error;
use anyhow::Result;
use std::collections::HashMap;

/// Running totals of an export
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExportStats {
    pub unique_items: usize,
    pub total_bytes: u64,
    pub average_bytes: f64,
    /// Tracks seen again after being counted
    pub duplicates: usize,
}

impl ExportStats {
    fn recompute(items: usize, bytes: u64, duplicates: usize) -> Self {
        Self {
            unique_items: items,
            total_bytes: bytes,
            average_bytes: if items == 0 {
                0.0
            } else {
                bytes as f64 / items as f64
            },
            duplicates,
        }
    }
}

/// Result of offering a track to the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Already counted through another playlist
    Duplicate,
    Accepted,
    /// Would exceed the limit; the playlist ends here
    OverBudget,
}

#[derive(Debug, Clone, Default)]
pub struct Budget {
    /// 0 = unlimited
    limit: u64,
    sizes: HashMap<EntryId, u64>,
    items: usize,
    bytes: u64,
    duplicates: usize,
}

impl Budget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn stats(&self) -> ExportStats {
        ExportStats::recompute(self.items, self.bytes, self.duplicates)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.sizes.contains_key(&id)
    }

    /// Whether another average sized track would still fit
    pub fn has_room(&self) -> bool {
        if self.limit == 0 {
            return true;
        }
        let average = self.stats().average_bytes.ceil() as u64;
        self.bytes + average <= self.limit
    }

    /// Count a track once; `size_of` is only asked for tracks not seen yet
    ///
    /// Unbudgeted tracks are always accepted but still counted.
    pub fn admit<F>(&mut self, id: EntryId, budgeted: bool, size_of: F) -> Result<Admission>
    where
        F: FnOnce() -> Result<u64>,
    {
        if self.contains(id) {
            self.duplicates += 1;
            return Ok(Admission::Duplicate);
        }

        let size = size_of()?;
        if budgeted && self.limit > 0 && self.bytes + size > self.limit {
            return Ok(Admission::OverBudget);
        }

        self.sizes.insert(id, size);
        self.items += 1;
        self.bytes += size;
        Ok(Admission::Accepted)
    }

    /// Compare the unique set against the running counters
    pub fn verify(&self) -> Result<()> {
        let set_items = self.sizes.len();
        let set_bytes: u64 = self.sizes.values().sum();
        if set_items != self.items || set_bytes != self.bytes {
            return Err(Error::IntegrityCheckFailed {
                set_items,
                set_bytes,
                counted_items: self.items,
                counted_bytes: self.bytes,
            }
            .into());
        }
        Ok(())
    }
}
