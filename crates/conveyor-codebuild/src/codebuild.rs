//! AWS CodeBuild job service.

use async_trait::async_trait;
use aws_sdk_codebuild::Client;
use aws_sdk_codebuild::types::{Build, StatusType};
use conveyor_core::{JobDescriptor, JobService, LogLocation, ProjectName, ServiceError};
use tracing::debug;

use crate::CodeBuildError;

/// Starts builds of pre-configured CodeBuild projects.
#[derive(Clone)]
pub struct CodeBuildJobs {
    client: Client,
}

impl CodeBuildJobs {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Whether the build has left the `IN_PROGRESS` state.
    pub async fn is_complete(&self, build_id: &str) -> Result<bool, CodeBuildError> {
        let output = self
            .client
            .batch_get_builds()
            .ids(build_id)
            .send()
            .await
            .map_err(|e| CodeBuildError::sdk("BatchGetBuilds", e))?;

        let build = output
            .builds()
            .first()
            .ok_or_else(|| CodeBuildError::BuildNotFound(build_id.to_string()))?;

        debug!(build_id, status = ?build.build_status(), "Checked build status");
        is_finished(build)
    }
}

#[async_trait]
impl JobService for CodeBuildJobs {
    fn name(&self) -> &'static str {
        "codebuild"
    }

    async fn start(
        &self,
        project: &ProjectName,
        source_version: &str,
    ) -> Result<JobDescriptor, ServiceError> {
        let output = self
            .client
            .start_build()
            .project_name(project.as_str())
            .source_version(source_version)
            .send()
            .await
            .map_err(|e| CodeBuildError::sdk("StartBuild", e))?;

        let build = output.build_value().ok_or(CodeBuildError::MissingField {
            operation: "StartBuild",
            field: "build",
        })?;

        Ok(descriptor_from_build(build)?)
    }
}

fn missing(field: &'static str) -> CodeBuildError {
    CodeBuildError::MissingField {
        operation: "StartBuild",
        field,
    }
}

/// Extract the build id and its CloudWatch log location.
pub(crate) fn descriptor_from_build(build: &Build) -> Result<JobDescriptor, CodeBuildError> {
    let id = build.id().ok_or_else(|| missing("build.id"))?;
    let logs = build.logs().ok_or_else(|| missing("build.logs"))?;
    let group_name = logs
        .group_name()
        .ok_or_else(|| missing("build.logs.groupName"))?;
    let stream_name = logs
        .stream_name()
        .ok_or_else(|| missing("build.logs.streamName"))?;

    Ok(JobDescriptor {
        id: id.to_string(),
        logs: LogLocation {
            group_name: group_name.to_string(),
            stream_name: stream_name.to_string(),
        },
    })
}

/// A build without a status cannot be followed to completion.
pub(crate) fn is_finished(build: &Build) -> Result<bool, CodeBuildError> {
    let status = build
        .build_status()
        .ok_or(CodeBuildError::MissingField {
            operation: "BatchGetBuilds",
            field: "build.buildStatus",
        })?;
    Ok(*status != StatusType::InProgress)
}
