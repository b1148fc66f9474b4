//! Log service trait.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::{JobDescriptor, ServiceError};

/// Ordered chunks of job log output.
///
/// The stream ends when the job log is complete. An `Err` item means the log
/// could not be read further; the stream should not be polled after it.
pub type LogReader = BoxStream<'static, std::io::Result<Bytes>>;

/// Trait for log aggregation services.
#[async_trait]
pub trait LogService: Send + Sync {
    /// Name of this service.
    fn name(&self) -> &'static str;

    /// Open the log stream of `job`, as located by `job.logs`.
    async fn open(&self, job: &JobDescriptor) -> Result<LogReader, ServiceError>;
}
