//! Error types for Conveyor.

use derive_more::Display;
use thiserror::Error;

/// Error returned by a job or log service backend.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Phase in which a build failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BuildErrorKind {
    InvalidOptions,
    StartFailed,
    LogOpenFailed,
    StreamCopyFailed,
}

/// Error returned by a build.
///
/// Every variant is terminal. Only `InvalidOptions` and `StartFailed` guarantee
/// that no remote job is running; the other two leave it running unobserved.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid build options: {0}")]
    InvalidOptions(String),

    #[error("unable to start build: {0}")]
    StartFailed(#[source] ServiceError),

    #[error("unable to open log stream: {0}")]
    LogOpenFailed(#[source] ServiceError),

    #[error("unable to stream logs: {0}")]
    StreamCopyFailed(#[source] std::io::Error),
}

impl BuildError {
    pub fn kind(&self) -> BuildErrorKind {
        match self {
            BuildError::InvalidOptions(_) => BuildErrorKind::InvalidOptions,
            BuildError::StartFailed(_) => BuildErrorKind::StartFailed,
            BuildError::LogOpenFailed(_) => BuildErrorKind::LogOpenFailed,
            BuildError::StreamCopyFailed(_) => BuildErrorKind::StreamCopyFailed,
        }
    }

    /// Whether a remote job may have been started before the failure.
    pub fn job_may_be_running(&self) -> bool {
        matches!(
            self,
            BuildError::LogOpenFailed(_) | BuildError::StreamCopyFailed(_)
        )
    }
}
