use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
}
