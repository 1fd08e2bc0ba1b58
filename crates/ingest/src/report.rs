//! Run outcome types, returned by value from each stage and persisted as
//! `run-summary.json` and `<source>/metadata.json`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relief_catalog::Manifest;
use relief_core::DateRange;
use relief_fetch::FetchOrigin;
use relief_normalize::DropCounts;
use relief_segment::{write_json_atomic, WriteError};
use serde::{Deserialize, Serialize};

use crate::sources::SourceSpec;

pub const RUN_SUMMARY_FILE: &str = "run-summary.json";
pub const SOURCE_METADATA_FILE: &str = "metadata.json";

// ── Run state ─────────────────────────────────────────────────

/// Orchestrator lifecycle: `Pending → Running(source) → … → Aggregating → Done`,
/// or `Fatal` when an error escapes every per-source scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "source", rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running(String),
    Aggregating,
    Done,
    Fatal,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Running(source) => write!(f, "running({source})"),
            RunState::Aggregating => write!(f, "aggregating"),
            RunState::Done => write!(f, "done"),
            RunState::Fatal => write!(f, "fatal"),
        }
    }
}

// ── Per-dataset ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    /// Every endpoint delivered (live or fallback) and the output was written.
    Succeeded,
    /// Written, but some endpoints delivered nothing usable.
    Partial,
    /// Nothing delivered, or the write failed. Previous output is untouched.
    Failed,
}

impl std::fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetStatus::Succeeded => f.pad("ok"),
            DatasetStatus::Partial => f.pad("partial"),
            DatasetStatus::Failed => f.pad("FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointReport {
    pub url: String,
    pub origin: FetchOrigin,
    pub rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub status: DatasetStatus,
    pub origin: FetchOrigin,
    pub endpoints: Vec<EndpointReport>,
    /// Raw rows across all endpoints, before normalization.
    pub rows: usize,
    pub records: usize,
    pub dropped: DropCounts,
    pub partitions: usize,
    pub recent_records: usize,
    pub recent_days: u32,
    pub date_range: Option<DateRange>,
    pub written: bool,
    pub bytes_written: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stale_removed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl DatasetReport {
    /// Report for a dataset that has not produced anything yet.
    pub fn new(dataset: &str, recent_days: u32) -> Self {
        Self {
            dataset: dataset.to_string(),
            status: DatasetStatus::Failed,
            origin: FetchOrigin::Empty,
            endpoints: Vec::new(),
            rows: 0,
            records: 0,
            dropped: DropCounts::default(),
            partitions: 0,
            recent_records: 0,
            recent_days,
            date_range: None,
            written: false,
            bytes_written: 0,
            stale_removed: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == DatasetStatus::Succeeded
    }
}

// ── Per-source ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub datasets: Vec<DatasetReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
    pub duration_ms: u64,
}

impl SourceReport {
    pub fn succeeded(&self) -> bool {
        self.metadata_error.is_none() && self.datasets.iter().all(DatasetReport::succeeded)
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetReport> {
        self.datasets.iter().find(|d| d.dataset == name)
    }
}

/// `<source>/metadata.json`: what this run published for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub source: String,
    pub base_url: String,
    pub last_updated: DateTime<Utc>,
    pub datasets: Vec<SourceDatasetEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDatasetEntry {
    pub name: String,
    pub status: DatasetStatus,
    pub origin: FetchOrigin,
    pub record_count: usize,
    pub partition_count: usize,
    pub recent_count: usize,
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceMetadata {
    pub fn from_report(
        spec: &SourceSpec,
        report: &SourceReport,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            source: spec.name.to_string(),
            base_url: spec.base_url.to_string(),
            last_updated,
            datasets: report
                .datasets
                .iter()
                .map(|d| SourceDatasetEntry {
                    name: d.dataset.clone(),
                    status: d.status,
                    origin: d.origin,
                    record_count: d.records,
                    partition_count: d.partitions,
                    recent_count: d.recent_records,
                    date_range: d.date_range,
                    error: d.error.clone(),
                })
                .collect(),
        }
    }

    pub fn save(&self, data_root: &Path) -> Result<u64, WriteError> {
        write_json_atomic(
            &data_root.join(&self.source).join(SOURCE_METADATA_FILE),
            self,
        )
    }
}

// ── Whole run ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub content_hash: String,
    pub sources: usize,
    pub datasets: usize,
    pub records: usize,
    pub size_bytes: u64,
    pub warnings: Vec<String>,
    /// Same file inventory as the manifest this run replaced.
    #[serde(default)]
    pub unchanged: bool,
}

impl From<&Manifest> for ManifestSummary {
    fn from(manifest: &Manifest) -> Self {
        Self {
            content_hash: manifest.content_hash.clone(),
            sources: manifest.totals.sources,
            datasets: manifest.totals.datasets,
            records: manifest.totals.records,
            size_bytes: manifest.totals.size_bytes,
            warnings: manifest.warnings.clone(),
            unchanged: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetTally {
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
}

/// `run-summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: RunState,
    /// Redacted configuration the run used.
    pub config: serde_json::Value,
    pub sources: Vec<SourceReport>,
    pub tally: DatasetTally,
    pub manifest: Option<ManifestSummary>,
}

impl ExecutionReport {
    pub fn new(started_at: DateTime<Utc>, config: serde_json::Value) -> Self {
        Self {
            started_at,
            finished_at: None,
            state: RunState::Pending,
            config,
            sources: Vec::new(),
            tally: DatasetTally::default(),
            manifest: None,
        }
    }

    pub fn push_source(&mut self, report: SourceReport) {
        for dataset in &report.datasets {
            match dataset.status {
                DatasetStatus::Succeeded => self.tally.succeeded += 1,
                DatasetStatus::Partial => self.tally.partial += 1,
                DatasetStatus::Failed => self.tally.failed += 1,
            }
        }
        self.sources.push(report);
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == name)
    }

    /// True when the run reached `Done` and every dataset succeeded.
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done && self.sources.iter().all(SourceReport::succeeded)
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }

    pub fn save(&self, data_root: &Path) -> Result<u64, WriteError> {
        write_json_atomic(&data_root.join(RUN_SUMMARY_FILE), self)
    }

    /// Human-readable summary for stdout.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let elapsed = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or_default();
        let _ = writeln!(out, "Ingestion run {} in {elapsed:.1}s", self.state);

        for source in &self.sources {
            let _ = writeln!(out, "  {}", source.source);
            for d in &source.datasets {
                let _ = write!(
                    out,
                    "    {:<18} {:<8} {:<9} {:>7} records  {:>3} partitions  recent {:>5}",
                    d.dataset, d.status, d.origin, d.records, d.partitions, d.recent_records
                );
                if d.dropped.total() > 0 {
                    let _ = write!(out, "  dropped {}", d.dropped.total());
                }
                if let Some(error) = &d.error {
                    let _ = write!(out, "  error: {error}");
                }
                out.push('\n');
            }
            if let Some(error) = &source.metadata_error {
                let _ = writeln!(out, "    metadata.json not written: {error}");
            }
        }

        let _ = writeln!(
            out,
            "Datasets: {} succeeded, {} partial, {} failed",
            self.tally.succeeded, self.tally.partial, self.tally.failed
        );
        if let Some(m) = &self.manifest {
            let short_hash: String = m.content_hash.chars().take(12).collect();
            let _ = writeln!(
                out,
                "Manifest: {} sources, {} datasets, {} records, {} bytes \
                 (hash {short_hash}, {} warnings{})",
                m.sources,
                m.datasets,
                m.records,
                m.size_bytes,
                m.warnings.len(),
                if m.unchanged { ", unchanged" } else { "" }
            );
        }
        out
    }
}
