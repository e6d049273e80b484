use std::sync::Arc;
use std::time::Duration;

use srs_client::routes::ExecutionPath;
use srs_client::{AuthSession, PortalApi, PortalApiError};
use srs_core::execution::StatusSource;
use srs_core::model::{Execution, ExecutionConfiguration, User};
use srs_core::status::ExecutionStatus;
use srs_poller::{ExecutionHandle, ExecutionPoller};
use tokio::sync::watch;

use crate::config::{ConfigError, PortalConfig};

/// Errors surfaced to the portal's callers.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] PortalApiError),
}

/// Shared application context, created once at startup and passed
/// explicitly to every view.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct PortalContext {
    pub config: Arc<PortalConfig>,
    /// REST client, also the poller's status source.
    pub api: Arc<PortalApi>,
    /// Registry of running execution poll sessions.
    pub poller: Arc<ExecutionPoller>,
}

impl PortalContext {
    pub fn new(config: PortalConfig) -> Result<Self, PortalError> {
        let session = Arc::new(match &config.auth_token {
            Some(token) => AuthSession::with_token(token.clone()),
            None => AuthSession::new(),
        });
        let api = PortalApi::with_timeout(
            config.api_url.clone(),
            session,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::with_api(config, api))
    }

    /// Build a context around an already configured client.
    pub fn with_api(config: PortalConfig, api: PortalApi) -> Self {
        let api = Arc::new(api);
        let source: Arc<dyn StatusSource> = api.clone();
        let poller = ExecutionPoller::new(source, config.poll.clone());
        Self {
            config: Arc::new(config),
            api,
            poller,
        }
    }

    /// Establish the session: log in when credentials are configured,
    /// otherwise validate whatever token the session holds.
    pub async fn authenticate(&self) -> Result<User, PortalError> {
        let user = match &self.config.credentials {
            Some(creds) => self.api.login(&creds.username, &creds.password).await?,
            None => self.api.load_current_user().await?,
        };
        tracing::info!(
            username = user.username.as_deref().unwrap_or("anonymous"),
            authenticated = user.authenticated,
            "Session established",
        );
        Ok(user)
    }

    /// Load an execution and wrap it in a view. Polling does not start
    /// until [`ExecutionView::activate`].
    pub async fn open_execution(&self, path: ExecutionPath) -> Result<ExecutionView, PortalError> {
        ExecutionView::open(self.clone(), path).await
    }
}

/// One execution as shown to a user.
///
/// The view owns the execution's [`ExecutionHandle`]; the poller only
/// writes to it. Dropping the view ends its poll session on the next tick.
pub struct ExecutionView {
    ctx: PortalContext,
    path: ExecutionPath,
    execution: Execution,
    handle: Arc<ExecutionHandle>,
}

impl ExecutionView {
    pub async fn open(ctx: PortalContext, path: ExecutionPath) -> Result<Self, PortalError> {
        let execution = ctx.api.get_execution(&path).await?;
        let handle = ExecutionHandle::from_execution(&execution)
            .unwrap_or_else(|_| ExecutionHandle::new(execution.id.clone(), path.path(), execution.status));

        tracing::debug!(
            execution = %path,
            status = %execution.status,
            status_url = handle.status_url(),
            "Execution view opened",
        );

        Ok(Self {
            ctx,
            path,
            execution,
            handle,
        })
    }

    pub fn path(&self) -> &ExecutionPath {
        &self.path
    }

    /// The execution as last loaded. Its status may lag [`status`](Self::status).
    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    pub fn handle(&self) -> &Arc<ExecutionHandle> {
        &self.handle
    }

    pub fn status(&self) -> ExecutionStatus {
        self.handle.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionStatus> {
        self.handle.subscribe()
    }

    /// Whether the shown status should be flagged as unknown because
    /// recent fetches failed.
    pub fn is_stale(&self) -> bool {
        self.handle
            .is_stale(self.ctx.config.poll.stale_after_failures)
    }

    /// Start polling. Activating an active view restarts its session.
    /// Returns `false` once the context's poller has been shut down.
    pub async fn activate(&self) -> bool {
        self.ctx.poller.watch(&self.handle).await
    }

    /// Stop polling. Nothing is written to the view afterwards.
    pub async fn deactivate(&self) -> bool {
        self.ctx.poller.unwatch(self.handle.id()).await
    }

    pub async fn is_active(&self) -> bool {
        self.ctx.poller.is_watching(self.handle.id()).await
    }

    /// Trigger the execution. An inactive view starts polling so the new
    /// status is picked up; an active one keeps its running session.
    pub async fn trigger(&mut self) -> Result<&Execution, PortalError> {
        self.execution = self.ctx.api.trigger_execution(&self.path).await?;
        if !self.is_active().await {
            self.activate().await;
        }
        Ok(&self.execution)
    }

    pub async fn configuration(&self) -> Result<ExecutionConfiguration, PortalError> {
        Ok(self.ctx.api.get_execution_configuration(&self.path).await?)
    }
}
