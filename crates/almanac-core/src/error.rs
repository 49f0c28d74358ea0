use thiserror::Error;

/// Settings that deserialized but cannot be used.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting {
        key: &'static str,
        reason: &'static str,
    },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
