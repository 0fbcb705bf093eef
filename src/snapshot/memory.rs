use std::collections::{HashMap, HashSet};

use super::{SnapshotError, SnapshotStore};
use crate::config::FeedSpec;
use crate::feed::Record;

/// Identifier sets held for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    seen: HashMap<String, HashSet<String>>,
}

impl SnapshotStore for MemoryStore {
    fn load(&self, feed: &FeedSpec) -> Result<Option<HashSet<String>>, SnapshotError> {
        Ok(self.seen.get(&feed.name).cloned())
    }

    fn save(&mut self, feed: &FeedSpec, records: &[Record]) -> Result<(), SnapshotError> {
        let ids = records.iter().map(|r| r.id.clone()).collect();
        self.seen.insert(feed.name.clone(), ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotMode;
    use crate::snapshot::test_support::{feed, record};

    #[test]
    fn test_unknown_feed_is_none() {
        let store = MemoryStore::default();
        assert!(store.load(&feed("items", SnapshotMode::Memory)).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_previous_set() {
        let mut store = MemoryStore::default();
        let items = feed("items", SnapshotMode::Memory);

        store.save(&items, &[record("1", "A"), record("2", "B")]).unwrap();
        store.save(&items, &[record("3", "C")]).unwrap();

        let seen = store.load(&items).unwrap().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen.contains("3"));
    }

    #[test]
    fn test_empty_save_is_distinct_from_never_seen() {
        let mut store = MemoryStore::default();
        let items = feed("items", SnapshotMode::Memory);

        store.save(&items, &[]).unwrap();
        assert_eq!(store.load(&items).unwrap(), Some(HashSet::new()));
    }

    #[test]
    fn test_feeds_are_independent() {
        let mut store = MemoryStore::default();
        store
            .save(&feed("a", SnapshotMode::Memory), &[record("1", "A")])
            .unwrap();
        assert!(store.load(&feed("b", SnapshotMode::Memory)).unwrap().is_none());
    }
}
