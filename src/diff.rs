//! Detects newly-appeared records between two polls of a feed.
use std::collections::HashSet;

use crate::feed::Record;

/// Outcome of comparing a fetch against the previously seen identifiers.
#[derive(Debug, PartialEq, Eq)]
pub enum Diff {
    /// No previous state existed. Nothing is announced; `seen` becomes the baseline.
    Baseline { seen: HashSet<String> },
    /// Records whose identifier was not seen before, in fetch order.
    Changes {
        new: Vec<Record>,
        seen: HashSet<String>,
    },
}

impl Diff {
    /// Identifier set of the current fetch, to persist for the next cycle.
    pub fn seen(&self) -> &HashSet<String> {
        match self {
            Diff::Baseline { seen } | Diff::Changes { seen, .. } => seen,
        }
    }

    /// Records to announce. Always empty for a baseline.
    pub fn new_records(&self) -> &[Record] {
        match self {
            Diff::Baseline { .. } => &[],
            Diff::Changes { new, .. } => new.as_slice(),
        }
    }
}

/// Compares `current` against `previous`.
///
/// With `previous == None` (first run for a feed) the result is a
/// [`Diff::Baseline`]. Otherwise the new records are exactly those of
/// `current` whose id is absent from `previous`. Identifiers that vanished
/// from the feed are simply dropped from the next `seen` set.
pub fn diff_records(previous: Option<&HashSet<String>>, current: &[Record]) -> Diff {
    let seen: HashSet<String> = current.iter().map(|r| r.id.clone()).collect();

    let Some(previous) = previous else {
        return Diff::Baseline { seen };
    };

    let new = current
        .iter()
        .filter(|r| !previous.contains(&r.id))
        .cloned()
        .collect();

    Diff::Changes { new, seen }
}
