//! CloudWatch Logs log service.
//!
//! CodeBuild writes each build's output to a CloudWatch log stream. The stream
//! itself never closes, so the tail polls the build status and ends once the
//! build is finished and CloudWatch reports no further events.

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::Client;
use bytes::Bytes;
use conveyor_core::{JobDescriptor, LogReader, LogService, ServiceError};
use futures::StreamExt;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;
use tracing::debug;

use crate::{CodeBuildError, CodeBuildJobs};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Follows CodeBuild output in CloudWatch Logs.
pub struct CloudWatchLogs {
    client: Client,
    builds: CodeBuildJobs,
    poll_interval: Duration,
}

impl CloudWatchLogs {
    pub fn new(client: Client, builds: CodeBuildJobs) -> Self {
        Self {
            client,
            builds,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Wait `interval` between polls that return no events.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl LogService for CloudWatchLogs {
    fn name(&self) -> &'static str {
        "cloudwatch"
    }

    async fn open(&self, job: &JobDescriptor) -> Result<LogReader, ServiceError> {
        if job.logs.group_name.is_empty() || job.logs.stream_name.is_empty() {
            return Err(CodeBuildError::InvalidLocation(format!(
                "group '{}' stream '{}'",
                job.logs.group_name, job.logs.stream_name
            ))
            .into());
        }

        let source = BuildLogSource {
            client: self.client.clone(),
            builds: self.builds.clone(),
            build_id: job.id.clone(),
            group_name: job.logs.group_name.clone(),
            stream_name: job.logs.stream_name.clone(),
        };
        Ok(LogTail::new(source, self.poll_interval).into_reader())
    }
}

/// One `GetLogEvents` response.
#[derive(Debug, Default)]
struct LogPage {
    messages: Vec<String>,
    next_token: Option<String>,
}

/// Where a tail reads pages and build status from.
#[async_trait]
trait LogSource: Send + Sync + 'static {
    /// Fetch the page following `token` (the head of the stream when `None`).
    async fn fetch_page(&self, token: Option<String>) -> Result<LogPage, CodeBuildError>;

    /// Whether the build writing the log has finished.
    async fn build_finished(&self) -> Result<bool, CodeBuildError>;
}

/// A CodeBuild build's CloudWatch log stream.
struct BuildLogSource {
    client: Client,
    builds: CodeBuildJobs,
    build_id: String,
    group_name: String,
    stream_name: String,
}

#[async_trait]
impl LogSource for BuildLogSource {
    async fn fetch_page(&self, token: Option<String>) -> Result<LogPage, CodeBuildError> {
        let result = self
            .client
            .get_log_events()
            .log_group_name(&self.group_name)
            .log_stream_name(&self.stream_name)
            .start_from_head(true)
            .set_next_token(token)
            .send()
            .await;

        match result {
            Ok(output) => Ok(LogPage {
                messages: output
                    .events()
                    .iter()
                    .filter_map(|e| e.message())
                    .map(str::to_string)
                    .collect(),
                next_token: output.next_forward_token().map(str::to_string),
            }),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Err(CodeBuildError::LogStreamNotFound(format!(
                    "{}/{}",
                    self.group_name, self.stream_name
                )))
            }
            Err(err) => Err(CodeBuildError::sdk("GetLogEvents", err)),
        }
    }

    async fn build_finished(&self) -> Result<bool, CodeBuildError> {
        self.builds.is_complete(&self.build_id).await
    }
}

/// Polling cursor over one log stream.
///
/// The log is drained once a fetch returns no events and hands back the token
/// it was given. Empty pages with a new token still have events behind them.
struct LogTail<S> {
    source: S,
    poll_interval: Duration,
    next_token: Option<String>,
    pending: VecDeque<Bytes>,
    build_finished: bool,
    done: bool,
}

impl<S: LogSource> LogTail<S> {
    fn new(source: S, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            next_token: None,
            pending: VecDeque::new(),
            build_finished: false,
            done: false,
        }
    }

    fn into_reader(self) -> LogReader {
        futures::stream::unfold(self, |mut tail| async move {
            tail.next_chunk().await.transpose().map(|item| (item, tail))
        })
        .boxed()
    }

    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Ok(Some(chunk));
            }
            if self.done {
                return Ok(None);
            }

            let sent = self.next_token.clone();
            let page = match self.source.fetch_page(sent.clone()).await {
                Ok(page) => page,
                Err(CodeBuildError::LogStreamNotFound(stream)) => {
                    debug!(%stream, "Log stream not created yet");
                    LogPage::default()
                }
                Err(e) => return Err(self.fail(e)),
            };

            let received = page.messages.len();
            self.pending
                .extend(page.messages.iter().map(|m| frame_message(m)));
            let caught_up = received == 0
                && page
                    .next_token
                    .as_ref()
                    .is_none_or(|token| sent.as_ref() == Some(token));
            if page.next_token.is_some() {
                self.next_token = page.next_token;
            }
            debug!(events = received, caught_up, "Fetched log events");

            if !caught_up {
                continue;
            }
            if self.build_finished {
                debug!("Log stream drained");
                self.done = true;
                continue;
            }

            self.build_finished = match self.source.build_finished().await {
                Ok(finished) => finished,
                Err(e) => return Err(self.fail(e)),
            };
            // After completion this lets CloudWatch ingest the last events
            // before the confirming fetch.
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn fail(&mut self, err: CodeBuildError) -> io::Error {
        self.done = true;
        self.pending.clear();
        io::Error::other(err)
    }
}

/// One log event as a newline-terminated chunk.
fn frame_message(message: &str) -> Bytes {
    let mut line = String::with_capacity(message.len() + 1);
    line.push_str(message);
    if !message.ends_with('\n') {
        line.push('\n');
    }
    Bytes::from(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_cloudwatchlogs::config::{BehaviorVersion, Region};
    use conveyor_core::LogLocation;
    use std::sync::{Arc, Mutex};

    type Fetch = Result<LogPage, CodeBuildError>;

    /// Source replaying scripted pages and build statuses.
    struct ScriptedSource {
        pages: Mutex<VecDeque<Fetch>>,
        statuses: Mutex<VecDeque<Result<bool, CodeBuildError>>>,
        sent: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Fetch>, statuses: Vec<Result<bool, CodeBuildError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                statuses: Mutex::new(statuses.into()),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LogSource for Arc<ScriptedSource> {
        async fn fetch_page(&self, token: Option<String>) -> Result<LogPage, CodeBuildError> {
            self.sent.lock().unwrap().push(token);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(sdk_error("no more scripted pages")))
        }

        async fn build_finished(&self) -> Result<bool, CodeBuildError> {
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(sdk_error("no more scripted statuses")))
        }
    }

    fn page(messages: &[&str], token: &str) -> Fetch {
        Ok(LogPage {
            messages: messages.iter().map(|m| m.to_string()).collect(),
            next_token: Some(token.to_string()),
        })
    }

    fn sdk_error(message: &str) -> CodeBuildError {
        CodeBuildError::Sdk {
            operation: "GetLogEvents",
            message: message.to_string(),
        }
    }

    async fn tail(source: &Arc<ScriptedSource>) -> Vec<io::Result<Bytes>> {
        LogTail::new(source.clone(), Duration::from_millis(1))
            .into_reader()
            .collect()
            .await
    }

    fn text(items: &[io::Result<Bytes>]) -> String {
        items
            .iter()
            .filter_map(|i| i.as_ref().ok())
            .map(|b| String::from_utf8_lossy(b).to_string())
            .collect()
    }

    fn offline_logs() -> CloudWatchLogs {
        let logs = aws_sdk_cloudwatchlogs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let builds = aws_sdk_codebuild::Config::builder()
            .behavior_version(aws_sdk_codebuild::config::BehaviorVersion::latest())
            .region(aws_sdk_codebuild::config::Region::new("us-east-1"))
            .build();
        CloudWatchLogs::new(
            Client::from_conf(logs),
            CodeBuildJobs::new(aws_sdk_codebuild::Client::from_conf(builds)),
        )
    }

    #[tokio::test]
    async fn test_empty_pages_with_new_token_do_not_end_log() {
        let source = Arc::new(ScriptedSource::new(
            vec![
                page(&["a"], "t1"),
                page(&[], "t2"),
                page(&[], "t3"),
                page(&["b"], "t4"),
                page(&[], "t4"),
                page(&[], "t4"),
            ],
            vec![Ok(true)],
        ));

        let items = tail(&source).await;

        assert_eq!(text(&items), "a\nb\n");
        assert!(items.iter().all(|i| i.is_ok()));
    }

    #[tokio::test]
    async fn test_follows_forward_tokens() {
        let source = Arc::new(ScriptedSource::new(
            vec![
                page(&["a"], "t1"),
                page(&["b"], "t2"),
                page(&[], "t2"),
                page(&[], "t2"),
            ],
            vec![Ok(true)],
        ));

        tail(&source).await;

        let sent = source.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                None,
                Some("t1".to_string()),
                Some("t2".to_string()),
                Some("t2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_waits_for_build_and_drains_late_events() {
        let source = Arc::new(ScriptedSource::new(
            vec![
                page(&["a"], "t1"),
                page(&[], "t1"),
                page(&[], "t1"),
                page(&["b"], "t2"),
                page(&[], "t2"),
            ],
            vec![Ok(false), Ok(true)],
        ));

        let items = tail(&source).await;

        assert_eq!(text(&items), "a\nb\n");
        assert!(source.statuses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_stream_is_an_empty_page() {
        let source = Arc::new(ScriptedSource::new(
            vec![
                Err(CodeBuildError::LogStreamNotFound("group/stream".to_string())),
                page(&["Entering phase INSTALL"], "t1"),
                page(&[], "t1"),
                page(&[], "t1"),
            ],
            vec![Ok(false), Ok(true)],
        ));

        let items = tail(&source).await;

        assert_eq!(text(&items), "Entering phase INSTALL\n");
        assert!(items.iter().all(|i| i.is_ok()));
    }

    #[tokio::test]
    async fn test_service_error_ends_stream() {
        let source = Arc::new(ScriptedSource::new(
            vec![page(&["a"], "t1"), Err(sdk_error("ThrottlingException"))],
            vec![],
        ));

        let items = tail(&source).await;

        assert_eq!(items.len(), 2);
        assert_eq!(text(&items), "a\n");
        let err = items[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("ThrottlingException"));
        assert_eq!(source.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_status_error_ends_stream() {
        let source = Arc::new(ScriptedSource::new(
            vec![page(&[], "t1"), page(&[], "t1")],
            vec![Err(CodeBuildError::BuildNotFound("b-1".to_string()))],
        ));

        let items = tail(&source).await;

        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().to_string().contains("b-1"));
    }

    #[test]
    fn test_frame_message_appends_newline() {
        assert_eq!(frame_message("Step 1/4"), Bytes::from_static(b"Step 1/4\n"));
    }

    #[test]
    fn test_frame_message_keeps_existing_newline() {
        assert_eq!(
            frame_message("[Container] Entering phase BUILD\n"),
            Bytes::from_static(b"[Container] Entering phase BUILD\n")
        );
    }

    #[test]
    fn test_frame_message_empty() {
        assert_eq!(frame_message(""), Bytes::from_static(b"\n"));
    }

    #[test]
    fn test_default_poll_interval() {
        let logs = offline_logs();
        assert_eq!(logs.poll_interval, Duration::from_secs(1));

        let logs = logs.with_poll_interval(Duration::from_millis(200));
        assert_eq!(logs.poll_interval, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_open_rejects_empty_location() {
        let logs = offline_logs();
        let job = JobDescriptor {
            id: "conveyor-acme-inc:5c2e1f0a".to_string(),
            logs: LogLocation {
                group_name: "/aws/codebuild/conveyor-acme-inc".to_string(),
                stream_name: String::new(),
            },
        };

        let err = match logs.open(&job).await {
            Ok(_) => panic!("expected an invalid location error"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("invalid log location"));
    }
}
