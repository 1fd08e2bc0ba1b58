use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relief_core::dates::parse_quarter_key;
use relief_segment::writer::{INDEX_FILE, RECENT_FILE};
use relief_segment::DatasetIndex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::manifest::{
    compute_inventory_hash, DatasetManifest, Manifest, ManifestTotals, SourceManifest,
    MANIFEST_VERSION,
};

/// Scans the output tree and aggregates per-source, per-dataset totals.
///
/// Expects the layout the dataset writer produces:
/// ```text
/// <data_root>/
///   <source>/
///     metadata.json        <- ignored here
///     <dataset>/
///       2024-Q1.json
///       recent.json
///       index.json
/// ```
/// Scanning never fails: missing directories and unreadable files become
/// zero counts plus a warning in the manifest.
pub struct ManifestBuilder {
    data_root: PathBuf,
    generated_at: DateTime<Utc>,
}

impl ManifestBuilder {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            generated_at: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Build the manifest for the given sources.
    pub fn build(&self, sources: &[&str]) -> Manifest {
        let mut warnings = Vec::new();
        let mut inventory = Vec::new();
        let mut source_entries = BTreeMap::new();

        for source in sources {
            let entry = self.scan_source(source, &mut inventory, &mut warnings);
            source_entries.insert(source.to_string(), entry);
        }

        let categories: BTreeSet<String> = source_entries
            .values()
            .flat_map(|s| s.datasets.keys().cloned())
            .collect();

        let totals = ManifestTotals {
            sources: source_entries.values().filter(|s| s.present).count(),
            datasets: source_entries.values().map(|s| s.dataset_count).sum(),
            records: source_entries.values().map(|s| s.record_count).sum(),
            files: inventory.len(),
            size_bytes: source_entries.values().map(|s| s.size_bytes).sum(),
        };

        info!(
            sources = totals.sources,
            datasets = totals.datasets,
            records = totals.records,
            bytes = totals.size_bytes,
            warnings = warnings.len(),
            "manifest aggregated"
        );

        Manifest {
            version: MANIFEST_VERSION,
            generated_at: self.generated_at,
            content_hash: compute_inventory_hash(&inventory),
            totals,
            categories: categories.into_iter().collect(),
            sources: source_entries,
            warnings,
        }
    }

    fn scan_source(
        &self,
        source: &str,
        inventory: &mut Vec<(String, u64)>,
        warnings: &mut Vec<String>,
    ) -> SourceManifest {
        let source_dir = self.data_root.join(source);
        if !source_dir.is_dir() {
            let message = format!("source '{source}' has no output directory");
            warn!(
                source,
                dir = %source_dir.display(),
                "source directory missing, counting as empty"
            );
            warnings.push(message);
            return SourceManifest::default();
        }

        let mut datasets: BTreeMap<String, DatasetManifest> = BTreeMap::new();
        let files: Vec<_> = WalkDir::new(&source_dir)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(source, error = %e, "skipping unreadable entry");
                    warnings.push(format!("{source}: {e}"));
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .collect();

        for entry in files {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            let Some(dataset) = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
            else {
                continue;
            };

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            inventory.push((relative(&self.data_root, path), size));

            let stats = datasets.entry(dataset.to_string()).or_default();
            stats.files += 1;
            stats.size_bytes += size;
            scan_file(path, name, stats, warnings);
        }

        let summary = SourceManifest {
            present: true,
            dataset_count: datasets.len(),
            record_count: datasets.values().map(|d| d.record_count).sum(),
            size_bytes: datasets.values().map(|d| d.size_bytes).sum(),
            datasets,
        };
        debug!(
            source,
            datasets = summary.dataset_count,
            records = summary.record_count,
            "scanned source"
        );
        summary
    }
}

/// Fold one file into its dataset's stats.
fn scan_file(path: &Path, name: &str, stats: &mut DatasetManifest, warnings: &mut Vec<String>) {
    if name == INDEX_FILE {
        match read_index(path) {
            Ok(index) => {
                stats.date_range = index.date_range;
                stats.last_updated = Some(index.metadata.last_updated);
            }
            Err(e) => corrupt(path, &e, warnings),
        }
        return;
    }

    let is_partition = name
        .strip_suffix(".json")
        .and_then(parse_quarter_key)
        .is_some();
    if !is_partition && name != RECENT_FILE {
        return;
    }

    let count = match count_records(path) {
        Ok(count) => count,
        Err(e) => {
            corrupt(path, &e, warnings);
            0
        }
    };
    if is_partition {
        stats.partition_count += 1;
        stats.record_count += count;
    } else {
        stats.recent_count = count;
    }
}

fn corrupt(path: &Path, error: &str, warnings: &mut Vec<String>) {
    warn!(file = %path.display(), error, "unreadable data file, counting 0 records");
    warnings.push(format!("{}: {error}", path.display()));
}

fn read_index(path: &Path) -> Result<DatasetIndex, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}

/// Length of the file's `data` array.
fn count_records(path: &Path) -> Result<usize, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    value
        .get("data")
        .and_then(|d| d.as_array())
        .map(Vec::len)
        .ok_or_else(|| "missing \"data\" array".to_string())
}

/// Forward-slash path relative to the data root.
fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
