use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use relief_core::config::RecentAnchor;
use relief_core::{quarter_key, DateRange, Record};

/// Records of one calendar quarter, sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// `YYYY-Qn`.
    pub key: String,
    pub records: Vec<Record>,
    pub range: DateRange,
}

impl Partition {
    pub fn file_name(&self) -> String {
        format!("{}.json", self.key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Quarter partitions of one dataset, ordered chronologically.
///
/// Partitions are disjoint and together hold every input record exactly once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionSet {
    partitions: Vec<Partition>,
}

impl PartitionSet {
    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.partitions.iter().map(|p| p.key.as_str()).collect()
    }

    pub fn total_records(&self) -> usize {
        self.partitions.iter().map(Partition::len).sum()
    }

    /// Overall date range across all partitions.
    pub fn range(&self) -> Option<DateRange> {
        let first = self.partitions.first()?;
        let last = self.partitions.last()?;
        Some(DateRange {
            start: first.range.start,
            end: last.range.end,
        })
    }

    /// Concatenate partitions back into one date-sorted sequence.
    pub fn flatten(&self) -> Vec<Record> {
        self.partitions
            .iter()
            .flat_map(|p| p.records.iter().cloned())
            .collect()
    }
}

/// Bucket records by calendar quarter.
///
/// Each bucket is stably sorted by date, so records sharing a date keep
/// their input order.
pub fn partition_by_quarter(records: &[Record]) -> PartitionSet {
    let mut buckets: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        buckets
            .entry(quarter_key(record.date))
            .or_default()
            .push(record.clone());
    }

    let partitions = buckets
        .into_iter()
        .filter_map(|(key, mut records)| {
            records.sort_by_key(|r| r.date);
            let range = DateRange::covering(records.iter().map(|r| r.date))?;
            Some(Partition {
                key,
                records,
                range,
            })
        })
        .collect();

    PartitionSet { partitions }
}

/// Rolling N-day slice of the most current records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentWindow {
    pub days: u32,
    /// Day the window is measured back from; `None` when there is nothing to anchor on.
    pub anchor: Option<NaiveDate>,
    pub records: Vec<Record>,
}

impl RecentWindow {
    pub fn cutoff(&self) -> Option<NaiveDate> {
        self.anchor.map(|anchor| window_start(anchor, self.days))
    }
}

/// First day of a `days`-long window ending on `anchor`, clamped to the
/// earliest representable date.
fn window_start(anchor: NaiveDate, days: u32) -> NaiveDate {
    anchor
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Records dated within `days` days of the anchor (inclusive on both ends).
///
/// With [`RecentAnchor::Latest`] the anchor is the latest record date; with
/// [`RecentAnchor::Today`] it is `today`. Input order is preserved.
pub fn recent_window(
    records: &[Record],
    days: u32,
    anchor: RecentAnchor,
    today: NaiveDate,
) -> RecentWindow {
    let anchor_date = match anchor {
        RecentAnchor::Latest => records.iter().map(|r| r.date).max(),
        RecentAnchor::Today => Some(today),
    };

    let Some(anchor_date) = anchor_date else {
        return RecentWindow {
            days,
            anchor: None,
            records: Vec::new(),
        };
    };

    let cutoff = window_start(anchor_date, days);
    let records = records
        .iter()
        .filter(|r| r.date >= cutoff && r.date <= anchor_date)
        .cloned()
        .collect();

    RecentWindow {
        days,
        anchor: Some(anchor_date),
        records,
    }
}
