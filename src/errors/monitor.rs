use thiserror::Error;

use super::{ConfigValidationError, ExportError, HistoryError, InitializationError};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    #[error("Initialization error: {0}")]
    Init(#[from] InitializationError),

    #[error("Refresh controller is not running")]
    ControllerGone,

    #[error("HTTP server error on {addr}: {source}")]
    Http {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl MonitorError {
    pub fn http(addr: impl Into<String>, source: std::io::Error) -> Self {
        MonitorError::Http {
            addr: addr.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for MonitorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(ConfigValidationError::config(err.to_string()))
    }
}
