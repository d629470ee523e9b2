use thiserror::Error;

/// Shared validation failures for core data types.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid stage name: {0}")]
    InvalidStage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
