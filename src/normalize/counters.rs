//! Per-request removal counters.

use std::ops::AddAssign;

use serde::Serialize;

/// What one normalization pass removed.
///
/// Created fresh for every request; never shared between requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemovalCounts {
    /// Top-level items looked at.
    pub items_inspected: usize,
    /// Timestamp prefixes removed.
    pub prefixes_removed: usize,
    /// Volatile keys removed.
    pub keys_removed: usize,
    /// Top-level items whose content changed.
    pub items_modified: usize,
}

impl RemovalCounts {
    /// Total fragments removed.
    pub fn removals(&self) -> usize {
        self.prefixes_removed + self.keys_removed
    }

    /// True when the pass removed nothing and modified nothing.
    pub fn is_clean(&self) -> bool {
        self.removals() == 0 && self.items_modified == 0
    }
}

impl AddAssign for RemovalCounts {
    fn add_assign(&mut self, other: Self) {
        self.items_inspected += other.items_inspected;
        self.prefixes_removed += other.prefixes_removed;
        self.keys_removed += other.keys_removed;
        self.items_modified += other.items_modified;
    }
}
