use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use relief_core::DateRange;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CatalogError;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

/// Root `manifest.json`: what every source published, with totals.
///
/// The `content_hash` is a SHA-256 hex digest of the sorted
/// `(relative path, byte size)` inventory of all data files. This allows
/// cheap equality checks to tell whether a run changed anything on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version for forward compatibility.
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub content_hash: String,
    pub totals: ManifestTotals,
    /// Sorted, de-duplicated dataset category names across all sources.
    pub categories: Vec<String>,
    pub sources: BTreeMap<String, SourceManifest>,
    /// Non-fatal problems met while scanning (missing dirs, corrupt files).
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTotals {
    pub sources: usize,
    pub datasets: usize,
    pub records: usize,
    pub files: usize,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceManifest {
    /// False when the source directory does not exist.
    pub present: bool,
    pub dataset_count: usize,
    pub record_count: usize,
    pub size_bytes: u64,
    pub datasets: BTreeMap<String, DatasetManifest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    /// Sum of partition record counts.
    pub record_count: usize,
    pub partition_count: usize,
    pub recent_count: usize,
    pub files: usize,
    pub size_bytes: u64,
    pub date_range: Option<DateRange>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Manifest {
    /// Check whether this (previously saved) manifest still describes the
    /// files `current` was built from.
    pub fn is_fresh(&self, current: &Manifest) -> bool {
        self.version == current.version && self.content_hash == current.content_hash
    }

    /// Load a manifest, `None` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, CatalogError> {
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Persist as `<data_root>/manifest.json`.
    pub fn save(&self, data_root: &Path) -> Result<u64, CatalogError> {
        Ok(relief_segment::write_json_atomic(
            &data_root.join(MANIFEST_FILE),
            self,
        )?)
    }
}

/// Deterministic SHA-256 hex hash of an inventory; order does not matter.
pub fn compute_inventory_hash(inventory: &[(String, u64)]) -> String {
    let mut sorted: Vec<&(String, u64)> = inventory.iter().collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    for (path, size) in sorted {
        hasher.update(path.as_bytes());
        hasher.update(b"\t");
        hasher.update(size.to_string().as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
