//! Batch ingestion of public humanitarian datasets into a static JSON tree.
//!
//! [`sources`] declares what to fetch, [`Orchestrator`] runs the
//! fetch → normalize → partition → write → aggregate pipeline, and
//! [`report`] holds what a run produced.

pub mod error;
pub mod orchestrator;
pub mod report;
pub mod sources;

pub use error::IngestError;
pub use orchestrator::{ManifestUpdate, Orchestrator};
pub use report::{
    DatasetReport, DatasetStatus, DatasetTally, EndpointReport, ExecutionReport, ManifestSummary,
    RunState, SourceMetadata, SourceReport,
};
pub use sources::{select_sources, DatasetSpec, EndpointSpec, SourceSpec, ALL_SOURCES};
