use thiserror::Error;

use crate::provider::ProviderError;

/// Everything that can stop a report from being produced.
///
/// All variants are fatal; the binary prints one line and exits non-zero.
#[derive(Error, Debug)]
pub enum ZiweiError {
    #[error("cannot read input file {path}")]
    InputRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("input file {path} is not valid JSON: {message}")]
    InputJson { path: String, message: String },
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ZiweiError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ZiweiError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending input field, for validation failures
    pub fn field(&self) -> Option<&str> {
        match self {
            ZiweiError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}
