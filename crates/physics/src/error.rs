//! Error types.
//!
//! The simulation itself never fails; only loading and validating tuning
//! parameters can.

use thiserror::Error;

/// Errors produced while loading or validating [`TuningParameters`](crate::TuningParameters).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse tuning file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid tuning parameter `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
