//! AWS backends for Conveyor.
//!
//! - [`CodeBuildJobs`] starts builds with AWS CodeBuild
//! - [`CloudWatchLogs`] tails their output from CloudWatch Logs

pub mod cloudwatch;
pub mod codebuild;
pub mod error;

pub use cloudwatch::CloudWatchLogs;
pub use codebuild::CodeBuildJobs;
pub use error::CodeBuildError;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_codebuild::config::Region;
use std::time::Duration;

/// Load AWS configuration from the environment, overriding the region if given.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

/// Build both backends from one SDK configuration.
pub fn backends(config: &SdkConfig, poll_interval: Duration) -> (CodeBuildJobs, CloudWatchLogs) {
    let jobs = CodeBuildJobs::new(aws_sdk_codebuild::Client::new(config));
    let logs = CloudWatchLogs::new(aws_sdk_cloudwatchlogs::Client::new(config), jobs.clone())
        .with_poll_interval(poll_interval);
    (jobs, logs)
}
