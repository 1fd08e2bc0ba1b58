use std::sync::Arc;

use serde_json::json;

use relief_fetch::{FetchOrigin, HttpResponse, ScriptedTransport};
use relief_ingest::sources::{GOOD_SHEPHERD, HDX as HDX_SOURCE, TECH_FOR_PALESTINE};
use relief_ingest::{DatasetStatus, IngestError, RunState};

use crate::helpers::{orchestrator, read_json, test_config, GOOD_SHEPHERD as GS, HDX, TFP};

#[tokio::test]
async fn test_fallback_snapshot_and_untouched_failures() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let data = config.storage.data_dir.clone();

    std::fs::create_dir_all(&config.storage.fallback_dir).unwrap();
    std::fs::write(
        config.storage.fallback_dir.join("goodshepherd-demolitions.json"),
        json!([{
            "demolition_date": "2024-02-10",
            "structures_demolished": 3,
            "locality": "Masafer Yatta"
        }])
        .to_string(),
    )
    .unwrap();

    // Output from an earlier run must survive a failed fetch.
    let healthcare_dir = data.join("goodshepherd/healthcare");
    std::fs::create_dir_all(&healthcare_dir).unwrap();
    std::fs::write(healthcare_dir.join("2023-Q4.json"), "previous run").unwrap();

    let transport = Arc::new(
        ScriptedTransport::new()
            .fail_times(&format!("{GS}/home_demolitions.json"), 1)
            .respond(&format!("{GS}/healthcare_attacks.json"), HttpResponse::status(404))
            .respond_json(
                &format!("{GS}/child_prisoners.json"),
                json!([{"month": "2024-03", "count": 250, "ages": "12-17"}]),
            ),
    );

    let report = orchestrator(config, transport.clone())
        .run(&[&GOOD_SHEPHERD])
        .await
        .unwrap();
    let source = report.source("goodshepherd").unwrap();

    let demolitions = source.dataset("demolitions").unwrap();
    assert_eq!(demolitions.status, DatasetStatus::Succeeded);
    assert_eq!(demolitions.origin, FetchOrigin::Fallback);
    assert_eq!(transport.calls(&format!("{GS}/home_demolitions.json")), 3);
    let q1 = read_json(&data.join("goodshepherd/demolitions/2024-Q1.json"));
    assert_eq!(q1["data"][0]["structures"], 3);
    assert_eq!(q1["data"][0]["location"], "Masafer Yatta");
    assert_eq!(q1["data"][0]["region"], "West Bank");

    let healthcare = source.dataset("healthcare").unwrap();
    assert_eq!(healthcare.status, DatasetStatus::Failed);
    assert_eq!(healthcare.origin, FetchOrigin::Empty);
    assert!(healthcare.error.as_deref().unwrap().contains("404"));
    assert_eq!(transport.calls(&format!("{GS}/healthcare_attacks.json")), 1);
    assert!(!healthcare.written);
    assert_eq!(
        std::fs::read_to_string(healthcare_dir.join("2023-Q4.json")).unwrap(),
        "previous run"
    );
    assert!(!healthcare_dir.join("index.json").exists());

    let prisoners = source.dataset("child-prisoners").unwrap();
    assert_eq!(prisoners.status, DatasetStatus::Succeeded);
    let index = read_json(&data.join("goodshepherd/child-prisoners/index.json"));
    assert_eq!(index["partitions"][0]["quarter"], "2024-Q1");

    let metadata = read_json(&data.join("goodshepherd/metadata.json"));
    assert_eq!(metadata["datasets"][0]["origin"], "fallback");
    assert_eq!(metadata["datasets"][1]["status"], "failed");

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.tally.failed, 1);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_failing_source_does_not_block_the_next() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let data = config.storage.data_dir.clone();

    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(&format!("{TFP}/"), HttpResponse::status(503))
            .respond_json(
                &format!("{HDX}/affected-people/idps"),
                json!({"data": [
                    {
                        "reference_period_start": "2024-03-01T00:00:00",
                        "admin1_name": "Gaza Strip",
                        "population": 1_700_000
                    },
                    {"reference_period_start": "not a date", "population": 5}
                ]}),
            )
            .respond_json(
                &format!("{HDX}/coordination-context/conflict-events"),
                json!({"detail": "unexpected envelope"}),
            ),
    );

    let report = orchestrator(config, transport.clone())
        .run(&[&TECH_FOR_PALESTINE, &HDX_SOURCE])
        .await
        .unwrap();

    let tfp = report.source("techforpalestine").unwrap();
    assert!(tfp.datasets.iter().all(|d| d.status == DatasetStatus::Failed));
    assert!(tfp.dataset("casualties").unwrap().error.as_deref().unwrap().contains("503"));

    let hdx = report.source("hdx").unwrap();
    let displacement = hdx.dataset("displacement").unwrap();
    assert_eq!(displacement.status, DatasetStatus::Succeeded);
    assert_eq!(displacement.records, 1);
    assert_eq!(displacement.dropped.invalid_date, 1);
    let q1 = read_json(&data.join("hdx/displacement/2024-Q1.json"));
    assert_eq!(q1["data"][0]["idps"], 1_700_000);
    assert_eq!(q1["data"][0]["location"], "Gaza Strip");

    let events = hdx.dataset("conflict-events").unwrap();
    assert_eq!(events.status, DatasetStatus::Failed);
    assert_eq!(events.origin, FetchOrigin::Api);
    assert!(!data.join("hdx/conflict-events").exists());

    assert!(transport
        .requests()
        .iter()
        .filter(|(url, _)| url.starts_with(HDX))
        .all(|(url, _)| url.contains("app_identifier=test-app")));

    let manifest = read_json(&data.join("manifest.json"));
    assert_eq!(manifest["sources"]["hdx"]["record_count"], 1);
    assert_eq!(manifest["sources"]["techforpalestine"]["dataset_count"], 0);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_write_failure_is_contained_to_its_dataset() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let data = config.storage.data_dir.clone();

    // A plain file where the dataset directory belongs.
    std::fs::create_dir_all(data.join("goodshepherd")).unwrap();
    std::fs::write(data.join("goodshepherd/healthcare"), "not a directory").unwrap();

    let transport = Arc::new(
        ScriptedTransport::new()
            .respond_json(
                &format!("{GS}/home_demolitions.json"),
                json!([{"demolition_date": "2024-02-10", "structures_demolished": 3}]),
            )
            .respond_json(
                &format!("{GS}/healthcare_attacks.json"),
                json!([{"incident_date": "2024-03-05", "health_workers_killed": 2}]),
            )
            .respond_json(
                &format!("{GS}/child_prisoners.json"),
                json!([{"month": "2024-03", "count": 250}]),
            ),
    );

    let report = orchestrator(config, transport)
        .run(&[&GOOD_SHEPHERD])
        .await
        .unwrap();
    let source = report.source("goodshepherd").unwrap();

    let healthcare = source.dataset("healthcare").unwrap();
    assert_eq!(healthcare.status, DatasetStatus::Failed);
    assert_eq!(healthcare.origin, FetchOrigin::Api);
    assert_eq!(healthcare.records, 1);
    assert!(!healthcare.written);
    assert!(healthcare.error.as_deref().unwrap().contains("write failed"));

    for sibling in ["demolitions", "child-prisoners"] {
        let dataset = source.dataset(sibling).unwrap();
        assert_eq!(dataset.status, DatasetStatus::Succeeded, "{sibling}");
        assert!(data.join("goodshepherd").join(sibling).join("index.json").exists());
    }

    let metadata = read_json(&data.join("goodshepherd/metadata.json"));
    assert_eq!(metadata["datasets"][1]["status"], "failed");
    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_unwritable_manifest_aborts_the_run() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let data = config.storage.data_dir.clone();

    // A directory in place of manifest.json makes the final rename fail.
    std::fs::create_dir_all(data.join("manifest.json")).unwrap();

    let transport = Arc::new(ScriptedTransport::new().respond_json(
        &format!("{GS}/child_prisoners.json"),
        json!([{"month": "2024-03", "count": 250}]),
    ));

    let result = orchestrator(config, transport).run(&[&GOOD_SHEPHERD]).await;

    assert!(
        matches!(result, Err(IngestError::Catalog(_))),
        "expected a catalog error, got {result:?}"
    );
    // Source output is already published; the summary is not.
    assert!(data.join("goodshepherd/child-prisoners/index.json").exists());
    assert!(data.join("goodshepherd/metadata.json").exists());
    assert!(!data.join("run-summary.json").exists());
}
