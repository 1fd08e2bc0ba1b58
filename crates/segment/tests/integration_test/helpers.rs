use std::path::Path;

use chrono::NaiveDate;

use relief_core::{FieldValue, Record};
use relief_segment::{DataFile, DatasetIndex};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Create a casualty-shaped record.
pub fn make_record(date: NaiveDate, killed: i64) -> Record {
    Record::new(date)
        .with_field("killed", FieldValue::Integer(killed))
        .with_field("report_source", FieldValue::Text("unknown".into()))
}

pub fn read_data_file(path: &Path) -> DataFile {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

pub fn read_index(path: &Path) -> DatasetIndex {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
