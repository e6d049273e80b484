//! One repeating status-fetch loop against one execution.
//!
//! A [`PollSession`] fetches immediately, publishes the result onto the
//! handle, and then either ends (terminal status) or waits the configured
//! interval and fetches again. Fetches within a session never overlap.
//!
//! [`PollSession::stop`] does not abort a fetch that is already in flight.
//! The fetch completes, but its result is discarded: once `stop` has
//! returned, the session writes nothing to the handle and issues no further
//! fetch. Status writes and the stop flag share a lock so the two cannot
//! interleave.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::Serialize;
use srs_core::execution::{FetchError, StatusSource};
use srs_core::status::ExecutionStatus;
use srs_core::types::EntityId;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::events::PollEvent;
use crate::handle::ExecutionHandle;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollOutcome {
    /// A terminal status was fetched and written to the handle.
    Terminal(ExecutionStatus),
    /// The session was stopped.
    Cancelled,
    /// The handle's owner let go of it.
    HandleDropped,
}

/// A running poll loop. Dropping the session stops it.
pub struct PollSession {
    execution_id: EntityId,
    state: Arc<SessionState>,
    task: Option<JoinHandle<PollOutcome>>,
}

impl PollSession {
    /// Start polling `handle` through `source`.
    ///
    /// Must be called from within a Tokio runtime. The first fetch is
    /// issued right away.
    pub fn start(
        handle: &Arc<ExecutionHandle>,
        source: Arc<dyn StatusSource>,
        config: &PollConfig,
    ) -> Self {
        Self::start_with(handle, source, config, CancellationToken::new(), None)
    }

    /// Start with an externally owned cancellation token (typically a child
    /// of a registry-wide token) and an optional event channel.
    pub(crate) fn start_with(
        handle: &Arc<ExecutionHandle>,
        source: Arc<dyn StatusSource>,
        config: &PollConfig,
        cancel: CancellationToken,
        events: Option<broadcast::Sender<PollEvent>>,
    ) -> Self {
        let execution_id = handle.id().to_string();
        let state = Arc::new(SessionState {
            stopped: Mutex::new(false),
            cancel,
        });

        let poll = PollLoop {
            execution_id: execution_id.clone(),
            status_url: handle.status_url().to_string(),
            handle: Arc::downgrade(handle),
            source,
            interval: config.interval,
            stale_after_failures: config.stale_after_failures,
            state: Arc::clone(&state),
            events,
        };

        tracing::info!(
            execution_id = %execution_id,
            interval_ms = config.interval.as_millis() as u64,
            "Starting execution status polling",
        );

        let task = tokio::spawn(poll.run());

        Self {
            execution_id,
            state,
            task: Some(task),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Stop the session. Idempotent.
    pub fn stop(&self) {
        if self.state.stop() {
            tracing::info!(execution_id = %self.execution_id, "Execution status polling stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the loop to exit.
    pub async fn join(mut self) -> PollOutcome {
        let Some(task) = self.task.take() else {
            return PollOutcome::Cancelled;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(execution_id = %self.execution_id, error = %e, "Poll task failed");
                PollOutcome::Cancelled
            }
        }
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        self.state.stop();
    }
}

// ---------------------------------------------------------------------------
// Shared session state
// ---------------------------------------------------------------------------

struct SessionState {
    /// Set by `stop`. Held while a fetched result is written.
    stopped: Mutex<bool>,
    /// Wakes the loop out of its inter-fetch delay.
    cancel: CancellationToken,
}

impl SessionState {
    /// Returns `true` if this call did the stopping.
    fn stop(&self) -> bool {
        let mut stopped = self.stopped.lock().unwrap_or_else(|p| p.into_inner());
        let newly = !*stopped;
        *stopped = true;
        self.cancel.cancel();
        newly
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(|p| p.into_inner()) || self.cancel.is_cancelled()
    }

    /// Run `write` unless the session is stopped, holding the stop lock.
    fn unless_stopped<R>(&self, write: impl FnOnce() -> R) -> Option<R> {
        let stopped = self.stopped.lock().unwrap_or_else(|p| p.into_inner());
        if *stopped || self.cancel.is_cancelled() {
            return None;
        }
        Some(write())
    }
}

// ---------------------------------------------------------------------------
// The loop
// ---------------------------------------------------------------------------

struct PollLoop {
    execution_id: EntityId,
    status_url: String,
    handle: Weak<ExecutionHandle>,
    source: Arc<dyn StatusSource>,
    interval: Duration,
    stale_after_failures: u32,
    state: Arc<SessionState>,
    events: Option<broadcast::Sender<PollEvent>>,
}

/// What a completed fetch did to the handle.
enum Applied {
    Status {
        previous: ExecutionStatus,
        status: ExecutionStatus,
    },
    Failure {
        consecutive_failures: u32,
        error: FetchError,
    },
}

impl PollLoop {
    async fn run(self) -> PollOutcome {
        let outcome = self.poll().await;

        tracing::info!(execution_id = %self.execution_id, ?outcome, "Execution status polling ended");
        self.emit(PollEvent::Finished {
            execution_id: self.execution_id.clone(),
            outcome,
        });

        outcome
    }

    async fn poll(&self) -> PollOutcome {
        let mut fetches: u64 = 0;

        loop {
            if self.state.is_stopped() {
                return PollOutcome::Cancelled;
            }
            if self.handle.strong_count() == 0 {
                return PollOutcome::HandleDropped;
            }

            fetches += 1;
            tracing::debug!(execution_id = %self.execution_id, fetch = fetches, "Fetching execution status");
            let result = self.source.fetch_status(&self.status_url).await;

            let Some(handle) = self.handle.upgrade() else {
                return PollOutcome::HandleDropped;
            };

            let applied = self.state.unless_stopped(|| match result {
                Ok(status) => Applied::Status {
                    previous: handle.record_status(status),
                    status,
                },
                Err(error) => Applied::Failure {
                    consecutive_failures: handle.record_failure(),
                    error,
                },
            });
            drop(handle);

            match applied {
                None => {
                    tracing::debug!(execution_id = %self.execution_id, "Discarding status fetched after stop");
                    return PollOutcome::Cancelled;
                }
                Some(Applied::Status { previous, status }) => {
                    self.on_status(previous, status);
                    // Checked after the write so observers always see the
                    // terminal value.
                    if status.is_terminal() {
                        return PollOutcome::Terminal(status);
                    }
                }
                Some(Applied::Failure {
                    consecutive_failures,
                    error,
                }) => self.on_failure(consecutive_failures, &error),
            }

            tokio::select! {
                _ = self.state.cancel.cancelled() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    fn on_status(&self, previous: ExecutionStatus, status: ExecutionStatus) {
        if previous == status {
            tracing::trace!(execution_id = %self.execution_id, %status, "Execution status unchanged");
            return;
        }

        tracing::info!(
            execution_id = %self.execution_id,
            %previous,
            %status,
            "Execution status changed",
        );
        self.emit(PollEvent::StatusChanged {
            execution_id: self.execution_id.clone(),
            previous,
            status,
        });
    }

    fn on_failure(&self, consecutive_failures: u32, error: &FetchError) {
        tracing::warn!(
            execution_id = %self.execution_id,
            consecutive_failures,
            error = %error,
            "Execution status fetch failed, will retry",
        );
        self.emit(PollEvent::FetchFailed {
            execution_id: self.execution_id.clone(),
            consecutive_failures,
            error: error.to_string(),
        });

        if self.stale_after_failures > 0 && consecutive_failures == self.stale_after_failures {
            tracing::warn!(
                execution_id = %self.execution_id,
                consecutive_failures,
                "Execution status is stale",
            );
            self.emit(PollEvent::Stale {
                execution_id: self.execution_id.clone(),
                consecutive_failures,
            });
        }
    }

    fn emit(&self, event: PollEvent) {
        if let Some(tx) = &self.events {
            // No subscribers is fine.
            let _ = tx.send(event);
        }
    }
}
