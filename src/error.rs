use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the orchestrator itself.
///
/// Failures of the wrapped task are never converted into this type: they flow
/// back to the caller of [`crate::Operation::execute`] unchanged.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Unknown step id: {id}")]
    UnknownStep { id: String },

    #[error("Invalid configuration for `{field}`: {message}")]
    InvalidConfig { field: &'static str, message: String },

    #[error("Failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl OperationError {
    pub fn unknown_step(id: impl Into<String>) -> Self {
        Self::UnknownStep { id: id.into() }
    }

    pub fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }

    /// Whether the error comes from the caller naming a step that doesn't exist
    pub fn is_unknown_step(&self) -> bool {
        matches!(self, Self::UnknownStep { .. })
    }
}

pub type Result<T> = std::result::Result<T, OperationError>;
