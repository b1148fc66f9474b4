//! Job service trait and job descriptors.

use async_trait::async_trait;

use crate::{ProjectName, ServiceError};

/// Where a job writes its log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLocation {
    pub group_name: String,
    pub stream_name: String,
}

/// A started job, as reported by the job service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Service-specific job identifier.
    pub id: String,
    /// Where the job's logs are written.
    pub logs: LogLocation,
}

/// Trait for remote build job services.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Name of this service.
    fn name(&self) -> &'static str;

    /// Start a build of `source_version` using the project `project`.
    ///
    /// Each call starts a new job. The project must already exist.
    async fn start(
        &self,
        project: &ProjectName,
        source_version: &str,
    ) -> Result<JobDescriptor, ServiceError>;
}
