use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relief_core::dates::parse_quarter_key;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::index::{
    DataFile, DatasetIndex, FileMetadata, IndexMetadata, PartitionEntry, RecentEntry,
};
use crate::partition::{PartitionSet, RecentWindow};

pub const INDEX_FILE: &str = "index.json";
pub const RECENT_FILE: &str = "recent.json";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WriteError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        WriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Atomically write `value` as pretty JSON.
///
/// Writes to a hidden `.{name}.tmp` sibling first, then renames over the
/// final path. Returns the number of bytes written.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<u64, WriteError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| WriteError::io(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out.json".to_string());
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    let json = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp_path, &json).map_err(|e| WriteError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| WriteError::io(path, e))?;
    Ok(json.len() as u64)
}

/// What one dataset write produced.
#[derive(Debug, Clone, Default)]
pub struct WriteSummary {
    pub dataset_dir: PathBuf,
    pub files_written: usize,
    pub bytes_written: u64,
    /// Partition files from earlier runs that no longer exist in the data.
    pub stale_removed: Vec<String>,
}

/// Persists a dataset under `<data-root>/<source>/<dataset>/`.
///
/// Output layout:
/// ```text
/// <source>/<dataset>/
///   2024-Q1.json   <- one file per quarter partition
///   2024-Q2.json
///   recent.json    <- rolling window
///   index.json     <- written last
/// ```
/// The index is only written once every partition and the recent file
/// succeeded, so it never references a file that failed to land.
pub struct DatasetWriter {
    data_root: PathBuf,
    generated_at: DateTime<Utc>,
}

impl DatasetWriter {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self::with_timestamp(data_root, Utc::now())
    }

    /// Writer stamping every file with `generated_at` as `last_updated`.
    pub fn with_timestamp(data_root: impl Into<PathBuf>, generated_at: DateTime<Utc>) -> Self {
        Self {
            data_root: data_root.into(),
            generated_at,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn dataset_dir(&self, source: &str, dataset: &str) -> PathBuf {
        self.data_root.join(source).join(dataset)
    }

    pub fn write(
        &self,
        source: &str,
        dataset: &str,
        partitions: &PartitionSet,
        recent: &RecentWindow,
    ) -> Result<WriteSummary, WriteError> {
        let dir = self.dataset_dir(source, dataset);
        fs::create_dir_all(&dir).map_err(|e| WriteError::io(&dir, e))?;

        let mut summary = WriteSummary {
            dataset_dir: dir.clone(),
            ..WriteSummary::default()
        };
        let mut entries = Vec::with_capacity(partitions.len());

        for partition in partitions.iter() {
            let file = DataFile {
                metadata: FileMetadata {
                    quarter: Some(partition.key.clone()),
                    date_range: Some(partition.range),
                    ..self.metadata(source, dataset, partition.len())
                },
                data: partition.records.clone(),
            };
            let file_name = partition.file_name();
            summary.bytes_written += write_json_atomic(&dir.join(&file_name), &file)?;
            summary.files_written += 1;
            debug!(
                source,
                dataset,
                quarter = %partition.key,
                records = partition.len(),
                "wrote partition"
            );

            entries.push(PartitionEntry {
                quarter: partition.key.clone(),
                file: file_name,
                record_count: partition.len(),
                date_range: partition.range,
            });
        }

        let recent_file = DataFile {
            metadata: FileMetadata {
                window_days: Some(recent.days),
                anchor: recent.anchor,
                date_range: relief_core::DateRange::covering(recent.records.iter().map(|r| r.date)),
                ..self.metadata(source, dataset, recent.records.len())
            },
            data: recent.records.clone(),
        };
        summary.bytes_written += write_json_atomic(&dir.join(RECENT_FILE), &recent_file)?;
        summary.files_written += 1;

        let index = DatasetIndex {
            metadata: IndexMetadata {
                source: source.to_string(),
                dataset: dataset.to_string(),
                record_count: partitions.total_records(),
                partition_count: partitions.len(),
                last_updated: self.generated_at,
            },
            date_range: partitions.range(),
            partitions: entries,
            recent: RecentEntry {
                file: RECENT_FILE.to_string(),
                record_count: recent.records.len(),
                window_days: recent.days,
                anchor: recent.anchor,
            },
        };
        summary.bytes_written += write_json_atomic(&dir.join(INDEX_FILE), &index)?;
        summary.files_written += 1;

        summary.stale_removed = remove_stale_partitions(&dir, partitions);

        info!(
            source,
            dataset,
            records = index.metadata.record_count,
            partitions = index.metadata.partition_count,
            recent = index.recent.record_count,
            bytes = summary.bytes_written,
            "dataset written"
        );
        Ok(summary)
    }

    fn metadata(&self, source: &str, dataset: &str, record_count: usize) -> FileMetadata {
        FileMetadata {
            source: source.to_string(),
            dataset: dataset.to_string(),
            record_count,
            last_updated: self.generated_at,
            quarter: None,
            date_range: None,
            window_days: None,
            anchor: None,
        }
    }
}

/// Delete `YYYY-Qn.json` files the current partition set no longer contains.
/// Failures are logged; the fresh index already excludes those files.
fn remove_stale_partitions(dir: &Path, partitions: &PartitionSet) -> Vec<String> {
    let keep = partitions.keys();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot scan for stale partitions");
            return Vec::new();
        }
    };

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stem) = name.strip_suffix(".json") else {
            continue;
        };
        if parse_quarter_key(stem).is_none() || keep.contains(&stem) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                info!(file = %name, "removed stale partition");
                removed.push(name);
            }
            Err(e) => warn!(file = %name, error = %e, "failed to remove stale partition"),
        }
    }
    removed.sort();
    removed
}
