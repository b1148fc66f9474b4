//! Build runner - starts a remote build and streams its log to a writer.

use async_trait::async_trait;
use conveyor_core::{
    BuildError, BuildOptions, Builder, DEFAULT_PROJECT_PREFIX, JobService, LogReader, LogService,
    ProjectName,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

/// Runs builds on a remote job service and follows their logs.
pub struct BuildRunner {
    jobs: Arc<dyn JobService>,
    logs: Arc<dyn LogService>,
    project_prefix: String,
}

impl BuildRunner {
    pub fn new(jobs: Arc<dyn JobService>, logs: Arc<dyn LogService>) -> Self {
        Self {
            jobs,
            logs,
            project_prefix: DEFAULT_PROJECT_PREFIX.to_string(),
        }
    }

    /// Use `prefix` instead of `conveyor` when naming job service projects.
    pub fn with_project_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.project_prefix = prefix.into();
        self
    }

    /// Project expected to exist in the job service for `repository`.
    pub fn project_name(&self, repository: &str) -> ProjectName {
        ProjectName::for_repository(&self.project_prefix, repository)
    }

    /// Start a build of `options.sha` and copy its log into `sink`.
    ///
    /// Returns once the log ends. Every call starts a new remote job.
    /// Dropping the returned future stops streaming but not the remote job.
    #[instrument(
        skip(self, sink, options),
        fields(repository = %options.repository, sha = %options.sha)
    )]
    pub async fn run<W>(&self, sink: &mut W, options: BuildOptions) -> Result<String, BuildError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        options.validate()?;

        let project = self.project_name(&options.repository);

        // TODO: create the project and retry when the job service reports it missing.
        info!(project = %project, service = self.jobs.name(), "Starting build");
        let job = self
            .jobs
            .start(&project, &options.sha)
            .await
            .map_err(BuildError::StartFailed)?;
        info!(
            project = %project,
            job_id = %job.id,
            log_group = %job.logs.group_name,
            log_stream = %job.logs.stream_name,
            "Build started"
        );

        let reader = self.logs.open(&job).await.map_err(|e| {
            warn!(job_id = %job.id, error = %e, "Build started but its log could not be opened");
            BuildError::LogOpenFailed(e)
        })?;
        debug!(job_id = %job.id, service = self.logs.name(), "Streaming logs");

        let copied = copy_logs(reader, sink).await.map_err(|e| {
            warn!(job_id = %job.id, error = %e, "Log streaming failed");
            BuildError::StreamCopyFailed(e)
        })?;

        info!(job_id = %job.id, bytes = copied, "Build log complete");
        Ok(options.build_id())
    }
}

#[async_trait]
impl Builder for BuildRunner {
    async fn build(
        &self,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        options: BuildOptions,
    ) -> Result<String, BuildError> {
        self.run(sink, options).await
    }
}

/// Copy every chunk from `reader` into `sink`, then flush.
async fn copy_logs<W>(mut reader: LogReader, sink: &mut W) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut copied = 0u64;
    while let Some(chunk) = reader.next().await {
        let chunk = chunk?;
        sink.write_all(&chunk).await?;
        copied += chunk.len() as u64;
    }
    sink.flush().await?;
    Ok(copied)
}
