use std::env;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

/// Records before this date are excluded from every output.
pub const DEFAULT_BASELINE_DATE: &str = "2023-10-07";

/// Longest recent window accepted from `RECENT_WINDOW_DAYS` (about 100 years).
pub const MAX_RECENT_WINDOW_DAYS: u32 = 36_525;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub pipeline: PipelineConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RELIEF_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RELIEF_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            fetch: FetchConfig::from_env_profiled(p),
            pipeline: PipelineConfig::from_env_profiled(p),
            credentials: CredentialsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  storage:     data_dir={}", self.storage.data_dir.display());
        tracing::info!(
            "  fetch:       max_attempts={}, base_delay_ms={}, max_delay_ms={}, timeout_secs={}",
            self.fetch.max_attempts,
            self.fetch.base_delay_ms,
            self.fetch.max_delay_ms,
            self.fetch.timeout_secs
        );
        tracing::info!(
            "  pipeline:    baseline={}, recent_days={}, anchor={:?}",
            self.pipeline.baseline_date,
            self.pipeline
                .recent_days_override
                .map(|d| d.to_string())
                .unwrap_or_else(|| "per-dataset".to_string()),
            self.pipeline.recent_anchor
        );
        tracing::info!(
            "  credentials: hdx={}, goodshepherd={}",
            self.credentials.hdx_app_identifier.is_some(),
            self.credentials.goodshepherd_api_key.is_some()
        );
    }

    /// Reject settings no run can work with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(invalid("DATA_DIR", ""));
        }
        if self.fetch.max_delay_ms < self.fetch.base_delay_ms {
            return Err(invalid(
                "FETCH_MAX_DELAY_MS",
                format!(
                    "{} < FETCH_BASE_DELAY_MS {}",
                    self.fetch.max_delay_ms, self.fetch.base_delay_ms
                ),
            ));
        }
        match self.pipeline.recent_days_override {
            Some(0) => return Err(invalid("RECENT_WINDOW_DAYS", "0")),
            Some(days) if days > MAX_RECENT_WINDOW_DAYS => {
                return Err(invalid(
                    "RECENT_WINDOW_DAYS",
                    format!("{days} > {MAX_RECENT_WINDOW_DAYS}"),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Return a redacted view safe for run summaries (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "storage": {
                "data_dir": self.storage.data_dir,
                "fallback_dir": self.storage.fallback_dir,
            },
            "fetch": {
                "max_attempts": self.fetch.max_attempts,
                "base_delay_ms": self.fetch.base_delay_ms,
                "max_delay_ms": self.fetch.max_delay_ms,
                "timeout_secs": self.fetch.timeout_secs,
                "jitter": self.fetch.jitter,
            },
            "pipeline": {
                "baseline_date": self.pipeline.baseline_date,
                "recent_days_override": self.pipeline.recent_days_override,
                "recent_anchor": self.pipeline.recent_anchor,
            },
            "credentials": {
                "hdx_configured": self.credentials.hdx_app_identifier.is_some(),
                "goodshepherd_configured": self.credentials.goodshepherd_api_key.is_some(),
            },
        })
    }
}

fn invalid(key: &str, value: impl Into<String>) -> CoreError {
    CoreError::InvalidConfig {
        key: key.to_string(),
        value: value.into(),
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the generated output tree.
    pub data_dir: PathBuf,
    /// Directory holding static fallback snapshots, looked up by file name.
    pub fallback_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "DATA_DIR", "public/data"));
        let fallback_dir = profiled_env_opt(p, "FALLBACK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("fallback"));
        Self {
            data_dir,
            fallback_dir,
        }
    }
}

// ── Fetch / retry ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
    pub jitter: bool,
    pub user_agent: String,
}

impl FetchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_attempts: profiled_env_u32(p, "FETCH_MAX_ATTEMPTS", 3).max(1),
            base_delay_ms: profiled_env_u64(p, "FETCH_BASE_DELAY_MS", 1_000),
            max_delay_ms: profiled_env_u64(p, "FETCH_MAX_DELAY_MS", 30_000),
            timeout_secs: profiled_env_u64(p, "FETCH_TIMEOUT_SECS", 60),
            jitter: profiled_env_bool(p, "FETCH_JITTER", true),
            user_agent: profiled_env_or(
                p,
                "HTTP_USER_AGENT",
                concat!("relief-ingest/", env!("CARGO_PKG_VERSION")),
            ),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            timeout_secs: 60,
            jitter: true,
            user_agent: concat!("relief-ingest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────

/// Which day the recent window is measured back from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecentAnchor {
    /// The latest record date in the dataset.
    Latest,
    /// The wall-clock day of the run.
    Today,
}

impl RecentAnchor {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "latest" => Some(Self::Latest),
            "today" => Some(Self::Today),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub baseline_date: NaiveDate,
    /// When set, replaces every dataset's own recent-window length.
    pub recent_days_override: Option<u32>,
    pub recent_anchor: RecentAnchor,
}

impl PipelineConfig {
    fn from_env_profiled(p: &str) -> Self {
        let baseline_raw = profiled_env_or(p, "BASELINE_DATE", DEFAULT_BASELINE_DATE);
        let baseline_date = NaiveDate::parse_from_str(&baseline_raw, "%Y-%m-%d")
            .unwrap_or_else(|_| {
                tracing::warn!(value = %baseline_raw, "invalid BASELINE_DATE, using default");
                default_baseline()
            });
        let recent_anchor = profiled_env_opt(p, "RECENT_ANCHOR")
            .and_then(|v| RecentAnchor::parse(&v))
            .unwrap_or(RecentAnchor::Latest);
        Self {
            baseline_date,
            recent_days_override: profiled_env_opt(p, "RECENT_WINDOW_DAYS")
                .and_then(|v| v.parse().ok()),
            recent_anchor,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            baseline_date: default_baseline(),
            recent_days_override: None,
            recent_anchor: RecentAnchor::Latest,
        }
    }
}

fn default_baseline() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 10, 7).unwrap_or_default()
}

// ── Upstream credentials ──────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// HDX HAPI app identifier, sent as the `app_identifier` query parameter.
    pub hdx_app_identifier: Option<String>,
    /// Optional key for the Good Shepherd Collective API (`x-api-key` header).
    pub goodshepherd_api_key: Option<String>,
}

impl CredentialsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            hdx_app_identifier: profiled_env_opt(p, "HDX_APP_IDENTIFIER"),
            goodshepherd_api_key: profiled_env_opt(p, "GOODSHEPHERD_API_KEY"),
        }
    }
}
