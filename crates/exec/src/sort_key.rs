//! Sort key wrapper carrying per-key direction.
//!
//! A sort key tuple is a `Vec<SortKey>` compared lexicographically, so a
//! single stable sort handles mixed ascending and descending keys.

use core::cmp::Ordering;

use strata_core::Value;

/// A single evaluated sort key with its direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortKey {
    Asc(Value),
    Desc(Value),
}

impl SortKey {
    /// Returns the wrapped value.
    pub fn value(&self) -> &Value {
        match self {
            SortKey::Asc(v) | SortKey::Desc(v) => v,
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Asc(a), SortKey::Asc(b)) => a.cmp(b),
            (SortKey::Desc(a), SortKey::Desc(b)) => b.cmp(a),
            // Keys at the same tuple position always share a direction;
            // fall back to the raw value order if they somehow differ.
            (a, b) => a.value().cmp(b.value()),
        }
    }
}
