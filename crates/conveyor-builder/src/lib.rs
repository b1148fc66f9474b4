//! Remote build runner for Conveyor.
//!
//! Starts a build through a [`JobService`], then follows its log through a
//! [`LogService`] until the log ends.

pub mod runner;

pub use conveyor_core::{
    BuildError, BuildErrorKind, BuildOptions, Builder, JobDescriptor, JobService, LogLocation,
    LogReader, LogService, ProjectName, ServiceError,
};
pub use runner::BuildRunner;
