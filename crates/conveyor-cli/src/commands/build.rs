//! Remote build command.

use anyhow::{Result, anyhow};
use conveyor_builder::{BuildError, BuildOptions, BuildRunner};
use conveyor_config::Settings;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tracing::{info, warn};

/// Start a build and stream its log to stdout.
pub async fn run(
    settings: Settings,
    repository: String,
    sha: String,
    timeout: Option<u64>,
) -> Result<()> {
    let sdk_config = conveyor_codebuild::load_sdk_config(settings.region.as_deref()).await;
    let (jobs, logs) = conveyor_codebuild::backends(&sdk_config, settings.log_poll_interval);
    let runner = BuildRunner::new(Arc::new(jobs), Arc::new(logs))
        .with_project_prefix(settings.project_prefix);

    let options = BuildOptions::new(repository, sha);
    let limit = timeout.map(Duration::from_secs);
    let mut stdout = tokio::io::stdout();

    let result = tokio::select! {
        result = run_with_limit(&runner, &mut stdout, options, limit) => result,
        _ = tokio::signal::ctrl_c() => {
            Err(anyhow!("interrupted; the remote build keeps running"))
        }
    };

    match result {
        Ok(build_id) => {
            info!(build_id = %build_id, "Build finished");
            println!("{}", build_id);
            Ok(())
        }
        Err(e) => {
            if e
                .downcast_ref::<BuildError>()
                .is_some_and(BuildError::job_may_be_running)
            {
                warn!("The remote build was started and may still be running");
            }
            Err(e)
        }
    }
}

async fn run_with_limit<W>(
    runner: &BuildRunner,
    sink: &mut W,
    options: BuildOptions,
    limit: Option<Duration>,
) -> Result<String>
where
    W: AsyncWrite + Unpin + Send,
{
    let build = runner.run(sink, options);
    let build_id = match limit {
        Some(limit) => tokio::time::timeout(limit, build).await.map_err(|_| {
            anyhow!(
                "build log did not end within {}s; the remote build keeps running",
                limit.as_secs()
            )
        })??,
        None => build.await?,
    };
    Ok(build_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_builder::{
        BuildErrorKind, JobDescriptor, JobService, LogLocation, LogReader, LogService,
        ProjectName, ServiceError,
    };
    use futures::StreamExt;

    struct StaticJobs;

    #[tokio::test]
    async fn test_timeout_stops_following() {
        let runner = BuildRunner::new(Arc::new(StaticJobs), Arc::new(PendingLogs));
        let mut out = Vec::new();

        let err = run_with_limit(
            &runner,
            &mut out,
            BuildOptions::new("acme-inc", "abc"),
            Some(Duration::from_millis(10)),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("did not end within"));
    }

    #[tokio::test]
    async fn test_build_error_is_preserved() {
        let runner = BuildRunner::new(Arc::new(StaticJobs), Arc::new(PendingLogs));
        let mut out = Vec::new();

        let err = run_with_limit(&runner, &mut out, BuildOptions::new("", "abc"), None)
            .await
            .unwrap_err();

        let build_err = err.downcast_ref::<BuildError>().unwrap();
        assert_eq!(build_err.kind(), BuildErrorKind::InvalidOptions);
    }

    #[async_trait::async_trait]
    impl JobService for StaticJobs {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn start(
            &self,
            project: &ProjectName,
            source_version: &str,
        ) -> Result<JobDescriptor, ServiceError> {
            Ok(JobDescriptor {
                id: format!("{}:{}", project, source_version),
                logs: LogLocation {
                    group_name: "group".to_string(),
                    stream_name: "stream".to_string(),
                },
            })
        }
    }

    /// Log that never ends.
    struct PendingLogs;

    #[async_trait::async_trait]
    impl LogService for PendingLogs {
        fn name(&self) -> &'static str {
            "pending"
        }

        async fn open(&self, _job: &JobDescriptor) -> Result<LogReader, ServiceError> {
            Ok(futures::stream::pending().boxed())
        }
    }
}
