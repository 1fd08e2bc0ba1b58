//! Run driver: sources one after another, dataset endpoints fanned out
//! concurrently within a source, then manifest aggregation and the run summary.
//!
//! Failures are contained at the narrowest scope. An endpoint that fails
//! degrades to its fallback snapshot or to nothing, a dataset that gets
//! nothing keeps its previous output, and a source never blocks the next one.
//! Only errors while aggregating or persisting the summary escape as
//! [`IngestError`], moving the run to [`RunState::Fatal`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use relief_catalog::manifest::MANIFEST_FILE;
use relief_catalog::{Manifest, ManifestBuilder};
use relief_core::{Config, DateRange};
use relief_fetch::{FetchOrigin, FetchOutcome, Fetcher, HttpTransport, RateLimiter, RetryPolicy};
use relief_normalize::{extract_rows, inject_constants, Normalizer};
use relief_segment::{partition_by_quarter, recent_window, DatasetWriter};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::report::{
    DatasetReport, DatasetStatus, EndpointReport, ExecutionReport, ManifestSummary, RunState,
    SourceMetadata, SourceReport,
};
use crate::sources::{source_names, DatasetSpec, SourceSpec};

/// Outcome of rebuilding `manifest.json`.
#[derive(Debug, Clone)]
pub struct ManifestUpdate {
    pub manifest: Manifest,
    /// The saved manifest already described the same files.
    pub unchanged: bool,
}

pub struct Orchestrator {
    config: Config,
    fetcher: Fetcher,
    writer: DatasetWriter,
    generated_at: DateTime<Utc>,
    rate_limits: bool,
}

impl Orchestrator {
    pub fn new(config: Config, transport: Arc<dyn HttpTransport>) -> Self {
        let fetcher = Fetcher::new(transport, RetryPolicy::from_config(&config.fetch));
        let generated_at = Utc::now();
        Self {
            writer: DatasetWriter::with_timestamp(&config.storage.data_dir, generated_at),
            config,
            fetcher,
            generated_at,
            rate_limits: true,
        }
    }

    /// Replace the retry policy (tests use [`RetryPolicy::immediate`]).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.fetcher = self.fetcher.with_policy(policy);
        self
    }

    /// Pin the run clock. `last_updated` stamps use it, and it is the
    /// "today" anchor of recent windows.
    pub fn with_clock(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self.writer = DatasetWriter::with_timestamp(&self.config.storage.data_dir, generated_at);
        self
    }

    pub fn with_rate_limits(mut self, enabled: bool) -> Self {
        self.rate_limits = enabled;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_root(&self) -> &Path {
        &self.config.storage.data_dir
    }

    fn today(&self) -> NaiveDate {
        self.generated_at.date_naive()
    }

    /// Run every selected source, then aggregate and persist the summary.
    pub async fn run(&self, sources: &[&SourceSpec]) -> Result<ExecutionReport, IngestError> {
        let mut report = ExecutionReport::new(Utc::now(), self.config.redacted_summary());
        info!(
            sources = sources.len(),
            data_dir = %self.data_root().display(),
            "ingestion run starting"
        );

        for source in sources {
            transition(&mut report, RunState::Running(source.name.to_string()));
            let source_report = self.run_source(source).await;
            report.push_source(source_report);
        }

        transition(&mut report, RunState::Aggregating);
        match self.finish(&mut report) {
            Ok(()) => Ok(report),
            Err(e) => {
                transition(&mut report, RunState::Fatal);
                error!(error = %e, "ingestion run aborted");
                Err(e)
            }
        }
    }

    fn finish(&self, report: &mut ExecutionReport) -> Result<(), IngestError> {
        let update = self.aggregate()?;
        let mut summary = ManifestSummary::from(&update.manifest);
        summary.unchanged = update.unchanged;
        report.manifest = Some(summary);
        report.finished_at = Some(Utc::now());
        transition(report, RunState::Done);
        report.save(self.data_root())?;
        Ok(())
    }

    /// Rebuild `manifest.json` over every registered source.
    ///
    /// An unreadable previous manifest only costs the change check.
    pub fn aggregate(&self) -> Result<ManifestUpdate, IngestError> {
        let previous = match Manifest::load(&self.data_root().join(MANIFEST_FILE)) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "previous manifest unreadable, rebuilding");
                None
            }
        };

        let manifest = ManifestBuilder::new(self.data_root())
            .with_timestamp(self.generated_at)
            .build(&source_names());
        let unchanged = previous.is_some_and(|p| p.is_fresh(&manifest));
        manifest.save(self.data_root())?;

        info!(
            hash = %manifest.content_hash,
            records = manifest.totals.records,
            unchanged,
            "manifest written"
        );
        Ok(ManifestUpdate {
            manifest,
            unchanged,
        })
    }

    /// Fetch, normalize and write every dataset of one source.
    ///
    /// Never fails: per-dataset problems are recorded in the report.
    pub async fn run_source(&self, source: &SourceSpec) -> SourceReport {
        let started = Instant::now();
        let fetcher = if self.rate_limits {
            self.fetcher
                .with_rate_limit(RateLimiter::new(source.min_interval))
        } else {
            self.fetcher.with_rate_limit(RateLimiter::unlimited())
        };

        let datasets = join_all(
            source
                .datasets
                .iter()
                .map(|dataset| self.run_dataset(source, dataset, &fetcher)),
        )
        .await;

        let mut report = SourceReport {
            source: source.name.to_string(),
            datasets,
            metadata_error: None,
            duration_ms: 0,
        };

        let metadata = SourceMetadata::from_report(source, &report, self.generated_at);
        if let Err(e) = metadata.save(self.data_root()) {
            warn!(source = source.name, error = %e, "failed to write source metadata");
            report.metadata_error = Some(e.to_string());
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            source = source.name,
            datasets = report.datasets.len(),
            succeeded = report.datasets.iter().filter(|d| d.succeeded()).count(),
            duration_ms = report.duration_ms,
            "source finished"
        );
        report
    }

    async fn run_dataset(
        &self,
        source: &SourceSpec,
        dataset: &DatasetSpec,
        fetcher: &Fetcher,
    ) -> DatasetReport {
        let started = Instant::now();
        let recent_days = dataset.recent_days(&self.config);
        let mut report = DatasetReport::new(dataset.name, recent_days);

        let outcomes = join_all(dataset.endpoints.iter().map(|endpoint| {
            let request = source.request(endpoint, &self.config.credentials);
            let fallback = endpoint.fallback_path(&self.config.storage.fallback_dir);
            async move {
                let url = request.full_url().unwrap_or_else(|_| request.url.clone());
                let outcome = fetcher
                    .fetch_with_fallback(&request, fallback.as_deref())
                    .await;
                (url, outcome)
            }
        }))
        .await;

        let mut rows: Vec<Value> = Vec::new();
        let mut usable = 0usize;
        for (endpoint, (url, outcome)) in dataset.endpoints.iter().zip(outcomes) {
            let mut entry = EndpointReport {
                url,
                origin: outcome.origin(),
                rows: 0,
                fallback_path: None,
                error: outcome.cause().map(|e| e.to_string()),
            };
            if let FetchOutcome::Fallback { path, .. } = &outcome {
                entry.fallback_path = Some(path.clone());
            }

            if let Some(payload) = outcome.data() {
                match extract_rows(payload, endpoint.rows_pointer) {
                    Ok(mut extracted) => {
                        inject_constants(&mut extracted, endpoint.constants);
                        entry.rows = extracted.len();
                        rows.extend(extracted);
                        usable += 1;
                    }
                    Err(e) => {
                        warn!(
                            source = source.name,
                            dataset = dataset.name,
                            url = %entry.url,
                            error = %e,
                            "unexpected payload shape, no rows taken"
                        );
                        entry.error = Some(e.to_string());
                    }
                }
            }
            report.endpoints.push(entry);
        }

        report.rows = rows.len();
        report.origin = combined_origin(&report.endpoints);

        if usable == 0 {
            let cause = report
                .endpoints
                .iter()
                .find_map(|e| e.error.clone())
                .unwrap_or_else(|| "no data".to_string());
            warn!(
                source = source.name,
                dataset = dataset.name,
                error = %cause,
                "dataset unavailable, keeping previous output"
            );
            report.error = Some(cause);
            report.duration_ms = started.elapsed().as_millis() as u64;
            return report;
        }

        let normalizer = Normalizer::new(Some(dataset.baseline(&self.config)));
        let normalized = normalizer.normalize_batch(dataset.schema, &rows);
        report.records = normalized.records.len();
        report.dropped = normalized.dropped;
        report.date_range = DateRange::covering(normalized.records.iter().map(|r| r.date));

        let partitions = partition_by_quarter(&normalized.records);
        let recent = recent_window(
            &normalized.records,
            recent_days,
            self.config.pipeline.recent_anchor,
            self.today(),
        );
        report.partitions = partitions.len();
        report.recent_records = recent.records.len();

        match self
            .writer
            .write(source.name, dataset.name, &partitions, &recent)
        {
            Ok(summary) => {
                report.written = true;
                report.bytes_written = summary.bytes_written;
                report.stale_removed = summary.stale_removed;
                report.status = if usable == dataset.endpoints.len() {
                    DatasetStatus::Succeeded
                } else {
                    DatasetStatus::Partial
                };
            }
            Err(e) => {
                error!(
                    source = source.name,
                    dataset = dataset.name,
                    error = %e,
                    "dataset write failed"
                );
                report.error = Some(format!("write failed: {e}"));
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            source = source.name,
            dataset = dataset.name,
            origin = %report.origin,
            rows = report.rows,
            records = report.records,
            dropped = report.dropped.total(),
            partitions = report.partitions,
            recent = report.recent_records,
            status = %report.status,
            "dataset processed"
        );
        report
    }
}

fn transition(report: &mut ExecutionReport, next: RunState) {
    info!(from = %report.state, to = %next, "run state");
    report.state = next;
}

/// `fallback` if any endpoint fell back, `api` if all delivered live,
/// `empty` if none delivered.
fn combined_origin(endpoints: &[EndpointReport]) -> FetchOrigin {
    if endpoints.iter().any(|e| e.origin == FetchOrigin::Fallback) {
        FetchOrigin::Fallback
    } else if endpoints.iter().any(|e| e.origin == FetchOrigin::Api) {
        FetchOrigin::Api
    } else {
        FetchOrigin::Empty
    }
}
