use thiserror::Error;

use almanac_rfc::rfc::ical::parse::ParseError;

/// Storage layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("Key file error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    #[error("No tokio runtime is available to schedule saves: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    CoreError(#[from] almanac_core::error::CoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
