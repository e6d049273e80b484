//! Locally held view of a remote execution.
//!
//! [`ExecutionHandle`] is owned by whoever holds the execution (a view, a
//! store) behind an `Arc`. The poller keeps only a `Weak` to it and is the
//! single writer of its status; observers read through
//! [`ExecutionHandle::subscribe`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use srs_core::error::CoreError;
use srs_core::model::Execution;
use srs_core::status::ExecutionStatus;
use srs_core::types::EntityId;
use tokio::sync::watch;

#[derive(Debug)]
pub struct ExecutionHandle {
    id: EntityId,
    status_url: String,
    status: watch::Sender<ExecutionStatus>,
    consecutive_failures: AtomicU32,
}

impl ExecutionHandle {
    /// * `id`         - execution id.
    /// * `status_url` - endpoint whose body carries the current `status`.
    /// * `status`     - last known status.
    pub fn new(id: impl Into<EntityId>, status_url: impl Into<String>, status: ExecutionStatus) -> Arc<Self> {
        let (tx, _rx) = watch::channel(status);
        Arc::new(Self {
            id: id.into(),
            status_url: status_url.into(),
            status: tx,
            consecutive_failures: AtomicU32::new(0),
        })
    }

    /// Handle for a fetched execution. The execution's own URL is its
    /// status endpoint.
    pub fn from_execution(execution: &Execution) -> Result<Arc<Self>, CoreError> {
        let url = execution.resource_url().ok_or_else(|| {
            CoreError::Validation(format!("execution {} has no url to poll", execution.id))
        })?;
        Ok(Self::new(execution.id.clone(), url, execution.status))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    /// Current status.
    pub fn status(&self) -> ExecutionStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every status write.
    pub fn subscribe(&self) -> watch::Receiver<ExecutionStatus> {
        self.status.subscribe()
    }

    /// Failed fetches since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Whether the shown status should be flagged as possibly out of date.
    pub fn is_stale(&self, after_failures: u32) -> bool {
        after_failures > 0 && self.consecutive_failures() >= after_failures
    }

    /// Publish a freshly fetched status. Returns the previous value.
    pub(crate) fn record_status(&self, status: ExecutionStatus) -> ExecutionStatus {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.status.send_replace(status)
    }

    /// Count a failed fetch. Returns the new consecutive-failure count.
    pub(crate) fn record_failure(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn record_status_notifies_subscribers() {
        let handle = ExecutionHandle::new("e1", "/executions/e1", ExecutionStatus::Queued);
        let mut rx = handle.subscribe();

        let previous = handle.record_status(ExecutionStatus::Building);

        assert_eq!(previous, ExecutionStatus::Queued);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ExecutionStatus::Building);
        assert_eq!(handle.status(), ExecutionStatus::Building);
    }

    #[test]
    fn failures_accumulate_until_success() {
        let handle = ExecutionHandle::new("e1", "/executions/e1", ExecutionStatus::Queued);

        assert_eq!(handle.record_failure(), 1);
        assert_eq!(handle.record_failure(), 2);
        assert!(handle.is_stale(2));
        assert!(!handle.is_stale(3));

        handle.record_status(ExecutionStatus::Queued);
        assert_eq!(handle.consecutive_failures(), 0);
        assert!(!handle.is_stale(1));
    }

    #[test]
    fn zero_threshold_never_reports_stale() {
        let handle = ExecutionHandle::new("e1", "/executions/e1", ExecutionStatus::Queued);
        handle.record_failure();
        assert!(!handle.is_stale(0));
    }

    #[test]
    fn from_execution_requires_a_url() {
        let execution = execution_with_url(None);
        assert_matches!(
            ExecutionHandle::from_execution(&execution),
            Err(CoreError::Validation(_))
        );

        let execution = execution_with_url(Some("/executions/e1"));
        let handle = ExecutionHandle::from_execution(&execution).unwrap();
        assert_eq!(handle.status_url(), "/executions/e1");
        assert_eq!(handle.status(), ExecutionStatus::BeforeTrigger);
    }

    fn execution_with_url(url: Option<&str>) -> Execution {
        Execution {
            id: "e1".into(),
            creation_time: None,
            status: ExecutionStatus::BeforeTrigger,
            url: url.map(str::to_string),
            build_scripts_url: None,
            links: Default::default(),
        }
    }
}
