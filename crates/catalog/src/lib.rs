pub mod builder;
pub mod error;
pub mod manifest;

pub use builder::ManifestBuilder;
pub use error::CatalogError;
pub use manifest::{DatasetManifest, Manifest, ManifestTotals, SourceManifest};
