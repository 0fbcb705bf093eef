//! Persistence of previously seen record identifiers, one set per feed.
//!
//! Two backends exist: [`MemoryStore`] (lost on restart, so the first cycle
//! after start seeds a fresh baseline) and [`CsvSnapshotStore`] (one CSV file
//! per feed, replaced atomically on every save). [`FeedStores`] routes each
//! feed to the backend its `snapshot` setting names.

mod csv_file;
mod memory;

use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{FeedSpec, SnapshotMode};
use crate::feed::Record;

pub use csv_file::CsvSnapshotStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed snapshot {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Snapshot {0} has no 'id' column")]
    MissingIdColumn(PathBuf),
    #[error("Feed '{0}' uses file snapshots but no cache_dir is configured")]
    NoCacheDir(String),
}

/// Storage for the last observed identifier set of each feed.
pub trait SnapshotStore: Send {
    /// Previously seen identifiers, or `None` if the feed has never been observed.
    fn load(&self, feed: &FeedSpec) -> Result<Option<HashSet<String>>, SnapshotError>;

    /// Replaces the stored snapshot with the records of the latest fetch.
    fn save(&mut self, feed: &FeedSpec, records: &[Record]) -> Result<(), SnapshotError>;
}

/// Routes each feed to the memory or file backend per its `snapshot` mode.
#[derive(Debug, Default)]
pub struct FeedStores {
    memory: MemoryStore,
    files: Option<CsvSnapshotStore>,
}

impl FeedStores {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            memory: MemoryStore::default(),
            files: cache_dir.map(CsvSnapshotStore::new),
        }
    }

    fn files_for(&self, feed: &FeedSpec) -> Result<&CsvSnapshotStore, SnapshotError> {
        self.files
            .as_ref()
            .ok_or_else(|| SnapshotError::NoCacheDir(feed.name.clone()))
    }
}

impl SnapshotStore for FeedStores {
    fn load(&self, feed: &FeedSpec) -> Result<Option<HashSet<String>>, SnapshotError> {
        match feed.snapshot {
            SnapshotMode::Memory => self.memory.load(feed),
            SnapshotMode::File => self.files_for(feed)?.load(feed),
        }
    }

    fn save(&mut self, feed: &FeedSpec, records: &[Record]) -> Result<(), SnapshotError> {
        match feed.snapshot {
            SnapshotMode::Memory => self.memory.save(feed, records),
            SnapshotMode::File => self
                .files
                .as_mut()
                .ok_or_else(|| SnapshotError::NoCacheDir(feed.name.clone()))?
                .save(feed, records),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::{FeedFormat, FeedSpec, SnapshotMode};
    use crate::feed::Record;

    pub fn feed(name: &str, snapshot: SnapshotMode) -> FeedSpec {
        FeedSpec {
            name: name.into(),
            url: "https://example.com/feed".into(),
            format: FeedFormat::Json,
            records_pointer: None,
            id_field: "id".into(),
            title_field: Some("name".into()),
            text_fields: vec!["rarity".into()],
            snapshot,
            template: None,
        }
    }

    pub fn record(id: &str, title: &str) -> Record {
        Record {
            id: id.into(),
            title: title.into(),
            fields: vec![("rarity".into(), "common".into())],
        }
    }
}
