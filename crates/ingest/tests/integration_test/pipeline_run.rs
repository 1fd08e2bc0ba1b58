use std::sync::Arc;

use serde_json::json;

use relief_core::config::RecentAnchor;
use relief_fetch::ScriptedTransport;
use relief_ingest::sources::{TECH_FOR_PALESTINE, WORLD_BANK};
use relief_ingest::{DatasetStatus, RunState};

use crate::helpers::{orchestrator, read_json, test_config, TFP, WORLD_BANK as WB};

fn casualties_transport() -> ScriptedTransport {
    ScriptedTransport::new()
        .respond_json(
            &format!("{TFP}/casualties_daily.json"),
            json!([
                {"date": "2024-01-15", "killed": 2},
                {"date": "2024-04-02", "killed": 3},
                {"date": "2023-10-01", "killed": 5}
            ]),
        )
        .respond_json(&format!("{TFP}/west_bank_daily.json"), json!([]))
        .respond_json(&format!("{TFP}/infrastructure-damaged.json"), json!([]))
}

#[tokio::test]
async fn test_baseline_partitions_and_recent_window() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.pipeline.recent_anchor = RecentAnchor::Today;
    config.pipeline.recent_days_override = Some(90);
    let data = config.storage.data_dir.clone();

    let transport = Arc::new(casualties_transport());
    let report = orchestrator(config, transport)
        .run(&[&TECH_FOR_PALESTINE])
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.exit_code(), 0);

    let casualties = report
        .source("techforpalestine")
        .and_then(|s| s.dataset("casualties"))
        .unwrap();
    assert_eq!(casualties.status, DatasetStatus::Succeeded);
    assert_eq!(casualties.rows, 3);
    assert_eq!(casualties.records, 2);
    assert_eq!(casualties.dropped.before_baseline, 1);
    assert_eq!(casualties.partitions, 2);
    assert_eq!(casualties.recent_records, 1);

    let dir = data.join("techforpalestine/casualties");
    let q1 = read_json(&dir.join("2024-Q1.json"));
    assert_eq!(q1["metadata"]["record_count"], 1);
    assert_eq!(q1["metadata"]["source"], "techforpalestine");
    assert_eq!(q1["data"][0]["date"], "2024-01-15");
    assert_eq!(q1["data"][0]["killed"], 2);
    let q2 = read_json(&dir.join("2024-Q2.json"));
    assert_eq!(q2["data"][0]["killed"], 3);
    assert!(!dir.join("2023-Q4.json").exists());

    let recent = read_json(&dir.join("recent.json"));
    assert_eq!(recent["metadata"]["window_days"], 90);
    assert_eq!(recent["data"].as_array().unwrap().len(), 1);
    assert_eq!(recent["data"][0]["date"], "2024-04-02");

    let index = read_json(&dir.join("index.json"));
    assert_eq!(index["metadata"]["record_count"], 2);
    assert_eq!(index["date_range"]["start"], "2024-01-15");
    assert_eq!(index["date_range"]["end"], "2024-04-02");

    // Datasets that fetched nothing still publish an empty index.
    let westbank = read_json(&data.join("techforpalestine/westbank/index.json"));
    assert_eq!(westbank["metadata"]["record_count"], 0);

    let metadata = read_json(&data.join("techforpalestine/metadata.json"));
    assert_eq!(metadata["datasets"].as_array().unwrap().len(), 3);
    assert_eq!(metadata["datasets"][0]["name"], "casualties");
    assert_eq!(metadata["datasets"][0]["origin"], "api");

    let manifest = read_json(&data.join("manifest.json"));
    assert_eq!(manifest["totals"]["sources"], 1);
    assert_eq!(manifest["totals"]["records"], 2);
    assert_eq!(
        manifest["sources"]["techforpalestine"]["datasets"]["casualties"]["partition_count"],
        2
    );
    assert_eq!(manifest["sources"]["hdx"]["present"], false);
    assert_eq!(manifest["warnings"].as_array().unwrap().len(), 3);

    let summary = read_json(&data.join("run-summary.json"));
    assert_eq!(summary["state"]["state"], "done");
    assert_eq!(summary["tally"]["succeeded"], 3);
    assert_eq!(summary["config"]["credentials"]["hdx_configured"], true);
    assert!(summary["config"].to_string().find("test-app").is_none());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let data = config.storage.data_dir.clone();
    let transport = Arc::new(casualties_transport());

    let first = orchestrator(config.clone(), transport.clone())
        .run(&[&TECH_FOR_PALESTINE])
        .await
        .unwrap();
    let q1_before = std::fs::read(data.join("techforpalestine/casualties/2024-Q1.json")).unwrap();

    let second = orchestrator(config, transport)
        .run(&[&TECH_FOR_PALESTINE])
        .await
        .unwrap();
    let q1_after = std::fs::read(data.join("techforpalestine/casualties/2024-Q1.json")).unwrap();

    assert_eq!(q1_before, q1_after);
    let first = first.manifest.unwrap();
    let second = second.manifest.unwrap();
    assert_eq!(first.content_hash, second.content_hash);
    assert!(!first.unchanged);
    assert!(second.unchanged);
}

#[tokio::test]
async fn test_manifest_rebuild_detects_changes() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let data = config.storage.data_dir.clone();
    let transport = Arc::new(casualties_transport());

    let orchestrator = orchestrator(config, transport);
    orchestrator.run(&[&TECH_FOR_PALESTINE]).await.unwrap();
    assert!(orchestrator.aggregate().unwrap().unchanged);

    std::fs::write(
        data.join("techforpalestine/casualties/2023-Q4.json"),
        r#"{"metadata":{},"data":[{"date":"2023-12-01"}]}"#,
    )
    .unwrap();
    let update = orchestrator.aggregate().unwrap();
    assert!(!update.unchanged);
    assert_eq!(update.manifest.totals.records, 3);
    assert!(orchestrator.aggregate().unwrap().unchanged);
}

fn indicator_rows(id: &str, years: &[(&str, f64)]) -> serde_json::Value {
    let rows: Vec<_> = years
        .iter()
        .map(|(year, value)| {
            json!({
                "indicator": {"id": id, "value": "label"},
                "country": {"id": "PS", "value": "West Bank and Gaza"},
                "countryiso3code": "PSE",
                "date": year,
                "value": value
            })
        })
        .collect();
    json!([{"page": 1, "pages": 1, "per_page": 200, "total": rows.len()}, rows])
}

#[tokio::test]
async fn test_indicator_fan_out_merges_endpoints() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let data = config.storage.data_dir.clone();
    let indicator = |code: &str| format!("{WB}/country/PSE/indicator/{code}");

    let transport = Arc::new(
        ScriptedTransport::new()
            .respond_json(
                &indicator("NY.GDP.MKTP.CD"),
                indicator_rows("NY.GDP.MKTP.CD", &[("2022", 19_100.0), ("2009", 8_000.0)]),
            )
            .respond_json(
                &indicator("SL.UEM.TOTL.ZS"),
                indicator_rows("SL.UEM.TOTL.ZS", &[("2022", 24.4)]),
            )
            .respond_json(
                &indicator("FP.CPI.TOTL.ZG"),
                indicator_rows("FP.CPI.TOTL.ZG", &[("2023", 5.9)]),
            )
            .fail(&indicator("SP.POP.TOTL"), "connection reset"),
    );

    let report = orchestrator(config, transport.clone())
        .run(&[&WORLD_BANK])
        .await
        .unwrap();

    let indicators = report
        .source("worldbank")
        .and_then(|s| s.dataset("indicators"))
        .unwrap();
    assert_eq!(indicators.status, DatasetStatus::Partial);
    assert_eq!(indicators.endpoints.len(), 4);
    assert_eq!(indicators.rows, 4);
    // 2009 predates the indicator baseline; the rest predate the global one but are kept.
    assert_eq!(indicators.records, 3);
    assert_eq!(indicators.dropped.before_baseline, 1);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(transport.calls(&indicator("SP.POP.TOTL")), 3);

    let q1_2022 = read_json(&data.join("worldbank/indicators/2022-Q1.json"));
    let rows = q1_2022["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["date"], "2022-01-01");
    assert_eq!(rows[0]["indicator"], "NY.GDP.MKTP.CD");
    assert_eq!(rows[0]["country"], "PSE");
    assert_eq!(rows[0]["unit"], "current US$");
    assert_eq!(rows[1]["unit"], "% of labor force");
    assert!(data.join("worldbank/indicators/2023-Q1.json").exists());
}
