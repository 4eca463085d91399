//! Error types for the sampler library.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while pulling a counter snapshot for one sampling tick.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no aggregate cpu line found in counter source")]
    MissingCpuLine,

    #[error("invalid cpu counter line: {0}")]
    Parse(String),

    #[error("sampler state lock poisoned")]
    Poisoned,
}

/// Invalid effective configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
