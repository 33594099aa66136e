//! State machine for asynchronous provider workflows (job/batch or file/MT).
//!
//! `Created -> Uploading -> Processing -> {Completed, Failed}`, with
//! `Processing -> Processing` driven by polling a status endpoint.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::TranslateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    fn can_become(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Created, JobState::Uploading)
                | (JobState::Uploading, JobState::Processing)
                | (JobState::Processing, JobState::Processing)
                | (JobState::Processing, JobState::Completed)
                | (JobState::Processing, JobState::Failed)
        )
    }
}

/// Interpretation of a provider status token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Completed,
    Failed,
    /// Anything else, including statuses the provider adds later.
    Pending(String),
}

impl RemoteStatus {
    pub fn parse(token: &str) -> Self {
        match token {
            "COMPLETED" => RemoteStatus::Completed,
            "FAILED" => RemoteStatus::Failed,
            other => RemoteStatus::Pending(other.to_string()),
        }
    }
}

/// Tracks one workflow instance. Owned by the strategy call that created it.
#[derive(Debug)]
pub struct JobTracker {
    handle: String,
    state: JobState,
}

impl JobTracker {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            state: JobState::Created,
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Replaces the handle once the provider has assigned more identifiers.
    pub fn set_handle(&mut self, handle: impl Into<String>) {
        self.handle = handle.into();
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn advance(&mut self, next: JobState) -> Result<(), TranslateError> {
        if !self.state.can_become(next) {
            return Err(TranslateError::InvalidTransition {
                handle: self.handle.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Calls `poll` every `interval` until it reports a terminal status.
    ///
    /// There is no attempt cap: an unfinished job is only abandoned when the
    /// caller drops this future (the orchestrator's deadline).
    pub async fn poll_until_terminal<F, Fut>(
        &mut self,
        interval: Duration,
        mut poll: F,
    ) -> Result<(), TranslateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, TranslateError>>,
    {
        let mut polls = 0u32;
        loop {
            let status = poll().await?;
            polls += 1;
            match RemoteStatus::parse(&status) {
                RemoteStatus::Completed => {
                    self.advance(JobState::Completed)?;
                    info!(handle = %self.handle, polls, "Translation job completed");
                    return Ok(());
                }
                RemoteStatus::Failed => {
                    self.advance(JobState::Failed)?;
                    warn!(handle = %self.handle, polls, "Translation job failed");
                    return Err(TranslateError::JobFailed {
                        handle: self.handle.clone(),
                        status,
                    });
                }
                RemoteStatus::Pending(status) => {
                    self.advance(JobState::Processing)?;
                    debug!(handle = %self.handle, %status, polls, "Translation job still processing");
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    /// Downloads are only legal once the job has completed.
    pub fn ensure_completed(&self) -> Result<(), TranslateError> {
        if self.state == JobState::Completed {
            Ok(())
        } else {
            Err(TranslateError::InvalidTransition {
                handle: self.handle.clone(),
                from: self.state,
                to: JobState::Completed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn processing_tracker() -> JobTracker {
        let mut tracker = JobTracker::new("job-1");
        tracker.advance(JobState::Uploading).unwrap();
        tracker.advance(JobState::Processing).unwrap();
        tracker
    }

    fn scripted(statuses: &[&str]) -> Mutex<VecDeque<String>> {
        Mutex::new(statuses.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_remote_status_tokens() {
        assert_eq!(RemoteStatus::parse("COMPLETED"), RemoteStatus::Completed);
        assert_eq!(RemoteStatus::parse("FAILED"), RemoteStatus::Failed);
        assert_eq!(
            RemoteStatus::parse("ADDING_FILES"),
            RemoteStatus::Pending("ADDING_FILES".to_string())
        );
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut tracker = JobTracker::new("job-1");
        assert!(tracker.advance(JobState::Processing).is_err());
        assert!(tracker.ensure_completed().is_err());
        assert_eq!(tracker.state(), JobState::Created);
    }

    #[tokio::test]
    async fn test_polls_through_unknown_statuses_until_completed() {
        let mut tracker = processing_tracker();
        let statuses = scripted(&["IN_PROGRESS", "SOMETHING_NEW", "COMPLETED"]);
        let mut polls = 0;

        tracker
            .poll_until_terminal(Duration::from_millis(1), || {
                polls += 1;
                let next = statuses.lock().unwrap().pop_front().unwrap();
                async move { Ok(next) }
            })
            .await
            .unwrap();

        assert_eq!(polls, 3);
        assert_eq!(tracker.state(), JobState::Completed);
        assert!(tracker.ensure_completed().is_ok());
    }

    #[tokio::test]
    async fn test_failed_status_names_the_handle() {
        let mut tracker = processing_tracker();
        let err = tracker
            .poll_until_terminal(Duration::from_millis(1), || async { Ok("FAILED".to_string()) })
            .await
            .unwrap_err();

        match err {
            TranslateError::JobFailed { handle, status } => {
                assert_eq!(handle, "job-1");
                assert_eq!(status, "FAILED");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(tracker.state(), JobState::Failed);
    }

    #[tokio::test]
    async fn test_poll_error_propagates() {
        let mut tracker = processing_tracker();
        let err = tracker
            .poll_until_terminal(Duration::from_millis(1), || async {
                Err(TranslateError::AuthFailure("expired".to_string()))
            })
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_unterminated_poll_ends_only_by_caller_timeout() {
        let mut tracker = processing_tracker();
        let outcome = tokio::time::timeout(
            Duration::from_millis(30),
            tracker.poll_until_terminal(Duration::from_millis(1), || async {
                Ok("IN_PROGRESS".to_string())
            }),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(tracker.state(), JobState::Processing);
    }
}
