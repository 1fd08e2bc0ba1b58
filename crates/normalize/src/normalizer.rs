use chrono::NaiveDate;
use relief_core::{parse_flexible_date, Record};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::{lookup, Schema};

/// Why a single row was dropped. Never fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("row is not a JSON object")]
    NotAnObject,

    #[error("no date in any of {candidates:?}")]
    MissingDate { candidates: Vec<String> },

    #[error("unparseable date {value:?}")]
    InvalidDate { value: String },

    #[error("date {date} predates baseline {baseline}")]
    BeforeBaseline { date: NaiveDate, baseline: NaiveDate },
}

/// Per-reason drop counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub not_object: usize,
    pub missing_date: usize,
    pub invalid_date: usize,
    pub before_baseline: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.not_object + self.missing_date + self.invalid_date + self.before_baseline
    }

    fn record(&mut self, error: &NormalizationError) {
        match error {
            NormalizationError::NotAnObject => self.not_object += 1,
            NormalizationError::MissingDate { .. } => self.missing_date += 1,
            NormalizationError::InvalidDate { .. } => self.invalid_date += 1,
            NormalizationError::BeforeBaseline { .. } => self.before_baseline += 1,
        }
    }
}

/// Output of [`Normalizer::normalize_batch`]: accepted records sorted by
/// date, plus what was dropped and why.
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub input_count: usize,
    pub records: Vec<Record>,
    pub dropped: DropCounts,
}

/// Normalizes raw rows against a [`Schema`], enforcing the baseline date.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    baseline: Option<NaiveDate>,
}

impl Normalizer {
    pub fn new(baseline: Option<NaiveDate>) -> Self {
        Self { baseline }
    }

    pub fn baseline(&self) -> Option<NaiveDate> {
        self.baseline
    }

    /// Map one upstream row to a canonical record.
    ///
    /// Only schema fields are kept; unknown upstream keys are discarded.
    pub fn normalize_record(
        &self,
        schema: &Schema,
        raw: &Value,
    ) -> Result<Record, NormalizationError> {
        let row = raw.as_object().ok_or(NormalizationError::NotAnObject)?;

        let date = resolve_date(schema, row)?;

        if let Some(baseline) = self.baseline {
            if date < baseline {
                return Err(NormalizationError::BeforeBaseline { date, baseline });
            }
        }

        let mut record = Record::new(date);
        for spec in schema.fields {
            record.fields.insert(spec.name.to_string(), spec.resolve(row));
        }
        Ok(record)
    }

    /// Normalize a batch, dropping (and counting) rows that fail. The
    /// accepted records are stably sorted ascending by date.
    pub fn normalize_batch(&self, schema: &Schema, rows: &[Value]) -> NormalizeReport {
        let mut report = NormalizeReport {
            input_count: rows.len(),
            records: Vec::with_capacity(rows.len()),
            dropped: DropCounts::default(),
        };

        for raw in rows {
            match self.normalize_record(schema, raw) {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    debug!(schema = schema.name, error = %e, "dropping row");
                    report.dropped.record(&e);
                }
            }
        }
        report.records.sort_by_key(|r| r.date);

        if report.dropped.total() > 0 {
            warn!(
                schema = schema.name,
                input = report.input_count,
                accepted = report.records.len(),
                not_object = report.dropped.not_object,
                missing_date = report.dropped.missing_date,
                invalid_date = report.dropped.invalid_date,
                before_baseline = report.dropped.before_baseline,
                "rows dropped during normalization"
            );
        }
        report
    }
}

/// First date candidate that parses. Unparseable values fall through to the
/// next candidate; the first of them is reported when none parse.
fn resolve_date(
    schema: &Schema,
    row: &Map<String, Value>,
) -> Result<NaiveDate, NormalizationError> {
    let mut unparseable: Option<String> = None;
    for name in schema.date_lookup_order() {
        let Some(raw) = lookup(row, name) else {
            continue;
        };
        let text = match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match parse_flexible_date(&text) {
            Some(date) => return Ok(date),
            None => {
                unparseable.get_or_insert(text);
            }
        }
    }

    Err(match unparseable {
        Some(value) => NormalizationError::InvalidDate { value },
        None => NormalizationError::MissingDate {
            candidates: schema.date_lookup_order().map(str::to_string).collect(),
        },
    })
}
