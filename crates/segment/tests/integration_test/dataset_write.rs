use chrono::{TimeZone, Utc};

use relief_core::config::RecentAnchor;
use relief_segment::{partition_by_quarter, recent_window, DatasetWriter};

use crate::helpers::{d, make_record, read_data_file, read_index};

#[test]
fn test_writes_partitions_recent_and_index() {
    let root = tempfile::tempdir().unwrap();
    let stamp = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
    let writer = DatasetWriter::with_timestamp(root.path(), stamp);

    let records = vec![make_record(d(2024, 1, 15), 2), make_record(d(2024, 4, 2), 3)];
    let partitions = partition_by_quarter(&records);
    let recent = recent_window(&records, 90, RecentAnchor::Today, d(2024, 5, 1));

    let summary = writer
        .write("techforpalestine", "casualties", &partitions, &recent)
        .unwrap();
    assert_eq!(summary.files_written, 4);
    assert!(summary.stale_removed.is_empty());

    let dir = root.path().join("techforpalestine/casualties");
    for name in ["2024-Q1.json", "2024-Q2.json", "recent.json", "index.json"] {
        assert!(dir.join(name).is_file(), "missing {name}");
    }

    let q1 = read_data_file(&dir.join("2024-Q1.json"));
    assert_eq!(q1.metadata.record_count, 1);
    assert_eq!(q1.metadata.quarter.as_deref(), Some("2024-Q1"));
    assert_eq!(q1.metadata.last_updated, stamp);
    assert_eq!(q1.data, vec![make_record(d(2024, 1, 15), 2)]);

    let recent_file = read_data_file(&dir.join("recent.json"));
    assert_eq!(recent_file.metadata.window_days, Some(90));
    assert_eq!(recent_file.data, vec![make_record(d(2024, 4, 2), 3)]);

    let index = read_index(&dir.join("index.json"));
    assert_eq!(index.metadata.record_count, 2);
    assert_eq!(index.metadata.partition_count, 2);
    let range = index.date_range.unwrap();
    assert_eq!((range.start, range.end), (d(2024, 1, 15), d(2024, 4, 2)));
    assert_eq!(index.partitions[0].quarter, "2024-Q1");
    assert_eq!(index.partitions[1].file, "2024-Q2.json");
    assert_eq!(index.recent.record_count, 1);
    assert_eq!(
        index.referenced_files(),
        vec!["2024-Q1.json", "2024-Q2.json", "recent.json"]
    );
}

#[test]
fn test_rerun_overwrites_and_removes_stale_partitions() {
    let root = tempfile::tempdir().unwrap();
    let writer = DatasetWriter::new(root.path());

    let first = vec![make_record(d(2023, 11, 1), 1), make_record(d(2024, 2, 1), 1)];
    writer
        .write(
            "goodshepherd",
            "demolitions",
            &partition_by_quarter(&first),
            &recent_window(&first, 30, RecentAnchor::Latest, d(2024, 2, 1)),
        )
        .unwrap();

    let second = vec![make_record(d(2024, 2, 1), 4), make_record(d(2024, 2, 9), 5)];
    let summary = writer
        .write(
            "goodshepherd",
            "demolitions",
            &partition_by_quarter(&second),
            &recent_window(&second, 30, RecentAnchor::Latest, d(2024, 2, 9)),
        )
        .unwrap();
    assert_eq!(summary.stale_removed, vec!["2023-Q4.json".to_string()]);

    let dir = root.path().join("goodshepherd/demolitions");
    assert!(!dir.join("2023-Q4.json").exists());
    let q1 = read_data_file(&dir.join("2024-Q1.json"));
    assert_eq!(q1.metadata.record_count, 2);

    let index = read_index(&dir.join("index.json"));
    assert_eq!(index.partitions.len(), 1);
    assert_eq!(index.metadata.record_count, 2);
}

#[test]
fn test_empty_dataset_still_gets_an_index() {
    let root = tempfile::tempdir().unwrap();
    let writer = DatasetWriter::new(root.path());
    let partitions = partition_by_quarter(&[]);
    let recent = recent_window(&[], 30, RecentAnchor::Latest, d(2024, 1, 1));

    writer.write("hdx", "displacement", &partitions, &recent).unwrap();

    let dir = root.path().join("hdx/displacement");
    let index = read_index(&dir.join("index.json"));
    assert_eq!(index.metadata.record_count, 0);
    assert!(index.partitions.is_empty());
    assert!(index.date_range.is_none());
    assert!(read_data_file(&dir.join("recent.json")).data.is_empty());
}

#[test]
fn test_unrelated_files_survive_cleanup() {
    let root = tempfile::tempdir().unwrap();
    let writer = DatasetWriter::new(root.path());
    let dir = root.path().join("worldbank/indicators");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("notes.json"), "{}").unwrap();
    std::fs::write(dir.join("2019-Q9.json"), "{}").unwrap();

    let records = vec![make_record(d(2022, 1, 1), 0)];
    writer
        .write(
            "worldbank",
            "indicators",
            &partition_by_quarter(&records),
            &recent_window(&records, 365, RecentAnchor::Latest, d(2022, 1, 1)),
        )
        .unwrap();

    assert!(dir.join("notes.json").exists());
    assert!(dir.join("2019-Q9.json").exists());
    assert!(dir.join("2022-Q1.json").exists());
}
