//! Core domain types and traits for Conveyor.
//!
//! This crate contains:
//! - Build options and the `Builder` capability
//! - Job service trait and job descriptors
//! - Log service trait and the log reader type
//! - Error types shared by every backend

pub mod build;
pub mod error;
pub mod job;
pub mod logs;

pub use build::{BuildOptions, Builder, DEFAULT_PROJECT_PREFIX, ProjectName};
pub use error::{BuildError, BuildErrorKind, ServiceError};
pub use job::{JobDescriptor, JobService, LogLocation};
pub use logs::{LogReader, LogService};
