//! Errors raised by the AWS backends.

use aws_sdk_codebuild::error::DisplayErrorContext;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodeBuildError {
    #[error("{operation} failed: {message}")]
    Sdk {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("build not found: {0}")]
    BuildNotFound(String),

    #[error("invalid log location: {0}")]
    InvalidLocation(String),

    #[error("log stream not found: {0}")]
    LogStreamNotFound(String),
}

impl CodeBuildError {
    pub(crate) fn sdk(operation: &'static str, err: impl std::error::Error) -> Self {
        Self::Sdk {
            operation,
            message: DisplayErrorContext(err).to_string(),
        }
    }
}
