//! Registry of execution poll sessions.
//!
//! [`ExecutionPoller`] keeps at most one active [`PollSession`] per
//! execution id. Sessions for different executions run independently; each
//! has its own stop flag, derived from a registry-wide token that
//! [`ExecutionPoller::shutdown`] cancels.
//!
//! Poll events are broadcast via a [`tokio::sync::broadcast`] channel. Call
//! [`ExecutionPoller::subscribe`] to receive them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use srs_core::execution::StatusSource;
use srs_core::types::EntityId;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::events::PollEvent;
use crate::handle::ExecutionHandle;
use crate::session::PollSession;

/// Broadcast channel capacity for poll events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for each session to exit.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls any number of executions through one status source.
///
/// Created once per application context. The returned `Arc` can be cheaply
/// cloned into views.
pub struct ExecutionPoller {
    sessions: Mutex<HashMap<EntityId, PollSession>>,
    source: Arc<dyn StatusSource>,
    config: PollConfig,
    event_tx: broadcast::Sender<PollEvent>,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
}

impl ExecutionPoller {
    pub fn new(source: Arc<dyn StatusSource>, config: PollConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            source,
            config,
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Subscribe to poll events for every execution.
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.event_tx.subscribe()
    }

    /// Start polling `handle`, replacing any session already running for
    /// the same execution id. Returns `false`, starting nothing, once the
    /// poller has been shut down.
    pub async fn watch(&self, handle: &Arc<ExecutionHandle>) -> bool {
        let mut sessions = self.sessions.lock().await;
        // Checked under the registry lock so a concurrent shutdown either
        // sees the new session or rejects it here.
        if self.cancel.is_cancelled() {
            tracing::warn!(execution_id = handle.id(), "Poller is shut down, not watching execution");
            return false;
        }
        sessions.retain(|_, session| !session.is_finished());

        if let Some(previous) = sessions.remove(handle.id()) {
            tracing::debug!(execution_id = handle.id(), "Replacing existing poll session");
            previous.stop();
        }

        let session = PollSession::start_with(
            handle,
            Arc::clone(&self.source),
            &self.config,
            self.cancel.child_token(),
            Some(self.event_tx.clone()),
        );
        sessions.insert(handle.id().to_string(), session);
        true
    }

    /// Stop polling an execution. Returns `false` if it was not watched.
    pub async fn unwatch(&self, execution_id: &str) -> bool {
        match self.sessions.lock().await.remove(execution_id) {
            Some(session) => {
                session.stop();
                true
            }
            None => false,
        }
    }

    /// Whether a session for `execution_id` is still running.
    pub async fn is_watching(&self, execution_id: &str) -> bool {
        self.sessions
            .lock()
            .await
            .get(execution_id)
            .is_some_and(|session| !session.is_finished())
    }

    /// Number of sessions still running.
    pub async fn active_count(&self) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|session| !session.is_finished())
            .count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop every session and wait for them to exit. Later calls to
    /// [`watch`](Self::watch) are rejected.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down execution poller");
        self.cancel.cancel();

        let sessions: Vec<PollSession> = self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            let execution_id = session.execution_id().to_string();
            session.stop();
            if tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, session.join())
                .await
                .is_err()
            {
                tracing::warn!(execution_id = %execution_id, "Poll session did not exit in time");
            }
        }

        tracing::info!("Execution poller shut down complete");
    }
}
