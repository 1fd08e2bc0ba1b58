use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use relief_core::config::{
    Config, CredentialsConfig, FetchConfig, PipelineConfig, StorageConfig,
};
use relief_fetch::{RetryPolicy, ScriptedTransport};
use relief_ingest::Orchestrator;

pub const TFP: &str = "https://data.techforpalestine.org/api/v2";
pub const HDX: &str = "https://hapi.humdata.org/api/v2";
pub const GOOD_SHEPHERD: &str = "https://goodshepherdcollective.org/api";
pub const WORLD_BANK: &str = "https://api.worldbank.org/v2";

/// Run clock: 2024-05-01, so "today"-anchored windows are deterministic.
pub fn run_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
}

pub fn test_config(root: &Path) -> Config {
    Config {
        profile: String::new(),
        storage: StorageConfig {
            data_dir: root.join("data"),
            fallback_dir: root.join("fallback"),
        },
        fetch: FetchConfig::default(),
        pipeline: PipelineConfig::default(),
        credentials: CredentialsConfig {
            hdx_app_identifier: Some("test-app".into()),
            goodshepherd_api_key: None,
        },
    }
}

pub fn orchestrator(config: Config, transport: Arc<ScriptedTransport>) -> Orchestrator {
    Orchestrator::new(config, transport)
        .with_retry_policy(RetryPolicy::immediate(3))
        .with_rate_limits(false)
        .with_clock(run_clock())
}

pub fn read_json(path: &Path) -> Value {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&raw).unwrap()
}
