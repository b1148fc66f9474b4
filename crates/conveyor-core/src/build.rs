//! Build options and the builder capability.

use async_trait::async_trait;
use derive_more::Display;
use tokio::io::AsyncWrite;

use crate::BuildError;

/// Prefix prepended to repository names to form job service project names.
pub const DEFAULT_PROJECT_PREFIX: &str = "conveyor";

/// What to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Repository identifier, e.g. `remind101/acme-inc`.
    pub repository: String,
    /// Revision to build.
    pub sha: String,
}

impl BuildOptions {
    pub fn new(repository: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            sha: sha.into(),
        }
    }

    /// Check that both fields are set.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.repository.trim().is_empty() {
            return Err(BuildError::InvalidOptions(
                "repository must not be empty".to_string(),
            ));
        }
        if self.sha.trim().is_empty() {
            return Err(BuildError::InvalidOptions(
                "sha must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Identifier returned for a successful build: `<repository>:<sha>`.
    pub fn build_id(&self) -> String {
        format!("{}:{}", self.repository, self.sha)
    }
}

/// Name of the project configured in the job service for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct ProjectName(String);

impl ProjectName {
    /// `<prefix>-<repository>`.
    pub fn for_repository(prefix: &str, repository: &str) -> Self {
        Self(format!("{}-{}", prefix, repository))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Something that can run a build and stream its output.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Run a build for `options`, writing log output to `sink` until the
    /// build log ends. Returns the build identifier.
    async fn build(
        &self,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        options: BuildOptions,
    ) -> Result<String, BuildError>;
}
