//! Static registry of upstream sources and the datasets each one publishes.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use relief_core::config::{Config, CredentialsConfig};
use relief_core::parse_flexible_date;
use relief_fetch::FetchRequest;
use relief_normalize::{schemas, Schema};
use tracing::warn;

use crate::error::IngestError;

// ── Types ─────────────────────────────────────────────────────

/// Which configured secret an [`Auth`] scheme sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    HdxAppIdentifier,
    GoodShepherdApiKey,
}

impl Credential {
    fn resolve(self, credentials: &CredentialsConfig) -> Option<&str> {
        match self {
            Credential::HdxAppIdentifier => credentials.hdx_app_identifier.as_deref(),
            Credential::GoodShepherdApiKey => credentials.goodshepherd_api_key.as_deref(),
        }
    }

    fn env_key(self) -> &'static str {
        match self {
            Credential::HdxAppIdentifier => "HDX_APP_IDENTIFIER",
            Credential::GoodShepherdApiKey => "GOODSHEPHERD_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    None,
    /// Secret sent as a query parameter; requests go out without it when unset.
    Query {
        param: &'static str,
        credential: Credential,
    },
    /// Optional header, omitted when the secret is unset.
    Header {
        name: &'static str,
        credential: Credential,
    },
}

/// Lower bound on dates a dataset keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// The configured `BASELINE_DATE`.
    Global,
    /// A fixed date, for series that predate the global baseline (annual data).
    Since(&'static str),
}

/// One upstream call feeding a dataset.
#[derive(Debug, Clone, Copy)]
pub struct EndpointSpec {
    /// Path appended to the source base URL.
    pub path: &'static str,
    pub query: &'static [(&'static str, &'static str)],
    /// JSON pointer to the row array in the response.
    pub rows_pointer: &'static str,
    /// Snapshot file name under the fallback directory.
    pub fallback_file: Option<&'static str>,
    /// Fields stamped onto every row before normalization.
    pub constants: &'static [(&'static str, &'static str)],
}

#[derive(Debug, Clone, Copy)]
pub struct DatasetSpec {
    /// Category directory name; also the schema name.
    pub name: &'static str,
    pub schema: &'static Schema,
    pub endpoints: &'static [EndpointSpec],
    /// Recent-window length, unless overridden by `RECENT_WINDOW_DAYS`.
    pub recent_days: u32,
    pub baseline: Baseline,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceSpec {
    pub name: &'static str,
    pub base_url: &'static str,
    pub auth: Auth,
    /// Minimum spacing between two requests to this source.
    pub min_interval: Duration,
    pub datasets: &'static [DatasetSpec],
}

// ── Behaviour ─────────────────────────────────────────────────

impl SourceSpec {
    /// Build the request for `endpoint`, applying this source's auth.
    pub fn request(
        &self,
        endpoint: &EndpointSpec,
        credentials: &CredentialsConfig,
    ) -> FetchRequest {
        let mut request = FetchRequest::new(format!("{}{}", self.base_url, endpoint.path));
        for (name, value) in endpoint.query {
            request = request.query(*name, *value);
        }

        match self.auth {
            Auth::None => {}
            Auth::Query { param, credential } => match credential.resolve(credentials) {
                Some(secret) => request = request.query(param, secret),
                None => warn!(
                    source = self.name,
                    key = credential.env_key(),
                    "credential not configured, requesting without it"
                ),
            },
            Auth::Header { name, credential } => {
                if let Some(secret) = credential.resolve(credentials) {
                    request = request.header(name, secret);
                }
            }
        }
        request
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetSpec> {
        self.datasets.iter().find(|d| d.name == name)
    }
}

impl DatasetSpec {
    /// Effective recent-window length under `config`.
    pub fn recent_days(&self, config: &Config) -> u32 {
        config
            .pipeline
            .recent_days_override
            .unwrap_or(self.recent_days)
    }

    /// Effective baseline under `config`.
    pub fn baseline(&self, config: &Config) -> NaiveDate {
        match self.baseline {
            Baseline::Global => config.pipeline.baseline_date,
            Baseline::Since(raw) => parse_flexible_date(raw).unwrap_or_else(|| {
                warn!(dataset = self.name, value = raw, "invalid dataset baseline, using global");
                config.pipeline.baseline_date
            }),
        }
    }
}

impl EndpointSpec {
    pub fn fallback_path(&self, fallback_dir: &Path) -> Option<std::path::PathBuf> {
        self.fallback_file.map(|file| fallback_dir.join(file))
    }
}

// ── Registry ──────────────────────────────────────────────────

const fn endpoint(path: &'static str, rows_pointer: &'static str) -> EndpointSpec {
    EndpointSpec {
        path,
        query: &[],
        rows_pointer,
        fallback_file: None,
        constants: &[],
    }
}

const HDX_QUERY: &[(&str, &str)] = &[
    ("location_code", "PSE"),
    ("output_format", "json"),
    ("limit", "10000"),
];

const WORLD_BANK_QUERY: &[(&str, &str)] = &[("format", "json"), ("per_page", "200")];

pub const TECH_FOR_PALESTINE: SourceSpec = SourceSpec {
    name: "techforpalestine",
    base_url: "https://data.techforpalestine.org/api/v2",
    auth: Auth::None,
    min_interval: Duration::from_millis(250),
    datasets: &[
        DatasetSpec {
            name: "casualties",
            schema: &schemas::CASUALTIES,
            endpoints: &[endpoint("/casualties_daily.json", "")],
            recent_days: 30,
            baseline: Baseline::Global,
        },
        DatasetSpec {
            name: "westbank",
            schema: &schemas::WEST_BANK,
            endpoints: &[endpoint("/west_bank_daily.json", "")],
            recent_days: 30,
            baseline: Baseline::Global,
        },
        DatasetSpec {
            name: "infrastructure",
            schema: &schemas::INFRASTRUCTURE,
            endpoints: &[endpoint("/infrastructure-damaged.json", "")],
            recent_days: 90,
            baseline: Baseline::Global,
        },
    ],
};

pub const HDX: SourceSpec = SourceSpec {
    name: "hdx",
    base_url: "https://hapi.humdata.org/api/v2",
    auth: Auth::Query {
        param: "app_identifier",
        credential: Credential::HdxAppIdentifier,
    },
    min_interval: Duration::from_millis(500),
    datasets: &[
        DatasetSpec {
            name: "displacement",
            schema: &schemas::DISPLACEMENT,
            endpoints: &[EndpointSpec {
                query: HDX_QUERY,
                ..endpoint("/affected-people/idps", "/data")
            }],
            recent_days: 90,
            baseline: Baseline::Global,
        },
        DatasetSpec {
            name: "conflict-events",
            schema: &schemas::CONFLICT_EVENTS,
            endpoints: &[EndpointSpec {
                query: HDX_QUERY,
                ..endpoint("/coordination-context/conflict-events", "/data")
            }],
            recent_days: 90,
            baseline: Baseline::Global,
        },
    ],
};

pub const GOOD_SHEPHERD: SourceSpec = SourceSpec {
    name: "goodshepherd",
    base_url: "https://goodshepherdcollective.org/api",
    auth: Auth::Header {
        name: "x-api-key",
        credential: Credential::GoodShepherdApiKey,
    },
    min_interval: Duration::from_millis(1_000),
    datasets: &[
        DatasetSpec {
            name: "demolitions",
            schema: &schemas::DEMOLITIONS,
            endpoints: &[EndpointSpec {
                fallback_file: Some("goodshepherd-demolitions.json"),
                constants: &[("region", "West Bank")],
                ..endpoint("/home_demolitions.json", "")
            }],
            recent_days: 90,
            baseline: Baseline::Global,
        },
        DatasetSpec {
            name: "healthcare",
            schema: &schemas::HEALTHCARE,
            endpoints: &[EndpointSpec {
                fallback_file: Some("goodshepherd-healthcare.json"),
                ..endpoint("/healthcare_attacks.json", "")
            }],
            recent_days: 90,
            baseline: Baseline::Global,
        },
        DatasetSpec {
            name: "child-prisoners",
            schema: &schemas::CHILD_PRISONERS,
            endpoints: &[EndpointSpec {
                fallback_file: Some("goodshepherd-child-prisoners.json"),
                ..endpoint("/child_prisoners.json", "")
            }],
            recent_days: 90,
            baseline: Baseline::Global,
        },
    ],
};

pub const WORLD_BANK: SourceSpec = SourceSpec {
    name: "worldbank",
    base_url: "https://api.worldbank.org/v2",
    auth: Auth::None,
    min_interval: Duration::from_millis(200),
    datasets: &[DatasetSpec {
        name: "indicators",
        schema: &schemas::INDICATORS,
        endpoints: &[
            EndpointSpec {
                query: WORLD_BANK_QUERY,
                constants: &[("unit", "current US$")],
                ..endpoint("/country/PSE/indicator/NY.GDP.MKTP.CD", "/1")
            },
            EndpointSpec {
                query: WORLD_BANK_QUERY,
                constants: &[("unit", "% of labor force")],
                ..endpoint("/country/PSE/indicator/SL.UEM.TOTL.ZS", "/1")
            },
            EndpointSpec {
                query: WORLD_BANK_QUERY,
                constants: &[("unit", "annual %")],
                ..endpoint("/country/PSE/indicator/FP.CPI.TOTL.ZG", "/1")
            },
            EndpointSpec {
                query: WORLD_BANK_QUERY,
                constants: &[("unit", "people")],
                ..endpoint("/country/PSE/indicator/SP.POP.TOTL", "/1")
            },
        ],
        recent_days: 730,
        baseline: Baseline::Since("2010-01-01"),
    }],
};

/// Every source, in run order.
pub const ALL_SOURCES: &[SourceSpec] = &[TECH_FOR_PALESTINE, HDX, GOOD_SHEPHERD, WORLD_BANK];

pub fn source_names() -> Vec<&'static str> {
    ALL_SOURCES.iter().map(|s| s.name).collect()
}

/// Resolve a `--source` selection. Empty selects everything, in registry order.
pub fn select_sources(names: &[String]) -> Result<Vec<&'static SourceSpec>, IngestError> {
    if names.is_empty() {
        return Ok(ALL_SOURCES.iter().collect());
    }
    if let Some(unknown) = names
        .iter()
        .find(|n| !ALL_SOURCES.iter().any(|s| s.name == n.as_str()))
    {
        return Err(IngestError::UnknownSource {
            name: unknown.clone(),
            known: source_names().join(", "),
        });
    }
    Ok(ALL_SOURCES
        .iter()
        .filter(|s| names.iter().any(|n| n == s.name))
        .collect())
}
