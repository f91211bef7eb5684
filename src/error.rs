use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures raised inside the store. They are logged and absorbed before
/// reaching callers of [`crate::store::LogStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize activity logs: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("stored activity logs are unreadable: {details}")]
    Decode { details: String },

    #[error("value {value:?} is not an option of {field}")]
    InvalidValue { field: &'static str, value: String },

    #[error("unknown field {0:?}")]
    UnknownField(String),

    #[error("invalid month {0:?} (expected YYYY-MM)")]
    InvalidMonth(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
