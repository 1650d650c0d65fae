use std::io;

use thiserror::Error;

/// Result alias used by every reader, writer and formatter of this crate.
pub type Result<T> = std::result::Result<T, CsvError>;

#[derive(Error, Debug)]
/// CSV stream error
pub enum CsvError {
    #[error("Configuration: {0}")]
    Config(String),

    #[error("I/O while {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported data shape: {0}")]
    UnsupportedDataShape(String),

    #[error("Incompatible row shape: {0}")]
    IncompatibleRowShape(String),
}

impl CsvError {
    pub(crate) fn io(action: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        CsvError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
