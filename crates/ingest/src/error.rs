use thiserror::Error;

/// Errors that escape a source's scope and abort the run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unknown source '{name}' (known: {known})")]
    UnknownSource { name: String, known: String },

    #[error("Write error: {0}")]
    Write(#[from] relief_segment::WriteError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] relief_catalog::CatalogError),
}
