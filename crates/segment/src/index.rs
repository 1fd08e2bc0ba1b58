//! On-disk document shapes. These files are the contract with the front
//! end, which fetches them as static assets.

use chrono::{DateTime, NaiveDate, Utc};
use relief_core::{DateRange, Record};
use serde::{Deserialize, Serialize};

/// `metadata` block carried by every data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub source: String,
    pub dataset: String,
    pub record_count: usize,
    pub last_updated: DateTime<Utc>,
    /// Set on partition files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Set on the recent-window file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<NaiveDate>,
}

/// A partition or recent-window file: `{ "metadata": {...}, "data": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFile {
    pub metadata: FileMetadata,
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub source: String,
    pub dataset: String,
    pub record_count: usize,
    pub partition_count: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub quarter: String,
    pub file: String,
    pub record_count: usize,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub file: String,
    pub record_count: usize,
    pub window_days: u32,
    pub anchor: Option<NaiveDate>,
}

/// `index.json`: what a dataset directory holds. Regenerated on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetIndex {
    pub metadata: IndexMetadata,
    pub date_range: Option<DateRange>,
    pub partitions: Vec<PartitionEntry>,
    pub recent: RecentEntry,
}

impl DatasetIndex {
    /// File names of every data file the index references.
    pub fn referenced_files(&self) -> Vec<&str> {
        self.partitions
            .iter()
            .map(|p| p.file.as_str())
            .chain(std::iter::once(self.recent.file.as_str()))
            .collect()
    }
}
