use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use super::{SnapshotError, SnapshotStore};
use crate::config::FeedSpec;
use crate::feed::Record;

/// One CSV file per feed under a cache directory: `<cache_dir>/<feed>.csv`.
///
/// The file holds the full last fetch (`id,title,<text fields...>`), so it
/// doubles as a human-readable dump of the feed. Only the `id` column is read
/// back.
#[derive(Debug, Clone)]
pub struct CsvSnapshotStore {
    dir: PathBuf,
}

impl CsvSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, feed: &FeedSpec) -> PathBuf {
        self.dir.join(format!("{}.csv", feed.name))
    }

    fn ensure_dir(&self) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })
    }
}

impl SnapshotStore for CsvSnapshotStore {
    fn load(&self, feed: &FeedSpec) -> Result<Option<HashSet<String>>, SnapshotError> {
        let path = self.path_for(feed);

        let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(&path) {
            Ok(reader) => reader,
            Err(e) => {
                if let csv::ErrorKind::Io(io) = e.kind() {
                    if io.kind() == std::io::ErrorKind::NotFound {
                        tracing::debug!(feed = %feed.name, path = %path.display(), "No snapshot yet");
                        return Ok(None);
                    }
                }
                return Err(SnapshotError::Csv { path, source: e });
            }
        };

        let csv_err = |source| SnapshotError::Csv {
            path: path.clone(),
            source,
        };

        let id_col = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .position(|h| h == "id")
            .ok_or_else(|| SnapshotError::MissingIdColumn(path.clone()))?;

        let mut ids = HashSet::new();
        for row in reader.records() {
            let row = row.map_err(csv_err)?;
            if let Some(id) = row.get(id_col).filter(|id| !id.is_empty()) {
                ids.insert(id.to_string());
            }
        }

        tracing::debug!(feed = %feed.name, ids = ids.len(), "Loaded snapshot");
        Ok(Some(ids))
    }

    fn save(&mut self, feed: &FeedSpec, records: &[Record]) -> Result<(), SnapshotError> {
        self.ensure_dir()?;
        let path = self.path_for(feed);
        atomic_write_csv(&path, feed, records)?;
        tracing::debug!(feed = %feed.name, rows = records.len(), path = %path.display(), "Saved snapshot");
        Ok(())
    }
}

/// Writes the snapshot to a fresh temp file, syncs it, then renames it over `dst`.
/// Readers never observe a partially written snapshot.
fn atomic_write_csv(dst: &Path, feed: &FeedSpec, records: &[Record]) -> Result<(), SnapshotError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // Unpredictable temp name + create_new: no clobbering, no symlink race
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", suffix));

    let io_err = |source| SnapshotError::Io {
        path: temp_path.clone(),
        source,
    };

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(io_err)?;

    let result = write_rows(file, feed, records, &temp_path).and_then(|()| {
        #[cfg(windows)]
        if dst.exists() {
            std::fs::remove_file(dst).map_err(|source| SnapshotError::Io {
                path: dst.to_path_buf(),
                source,
            })?;
        }
        std::fs::rename(&temp_path, dst).map_err(|source| SnapshotError::Io {
            path: dst.to_path_buf(),
            source,
        })
    });

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn write_rows(
    file: std::fs::File,
    feed: &FeedSpec,
    records: &[Record],
    temp_path: &Path,
) -> Result<(), SnapshotError> {
    let csv_err = |source| SnapshotError::Csv {
        path: temp_path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_writer(file);

    let mut header = vec!["id", "title"];
    header.extend(feed.text_fields.iter().map(String::as_str));
    writer.write_record(&header).map_err(csv_err)?;

    for record in records {
        let mut row = vec![record.id.as_str(), record.title.as_str()];
        row.extend(
            feed.text_fields
                .iter()
                .map(|name| record.field(name).unwrap_or("")),
        );
        writer.write_record(&row).map_err(csv_err)?;
    }

    let file = writer.into_inner().map_err(|e| SnapshotError::Io {
        path: temp_path.to_path_buf(),
        source: e.into_error(),
    })?;
    file.sync_all().map_err(|source| SnapshotError::Io {
        path: temp_path.to_path_buf(),
        source,
    })
}
