use thiserror::Error;

/// Errors produced while persisting or loading the manifest.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Write(#[from] relief_segment::WriteError),
}
