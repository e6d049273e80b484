//! `srs-portal` -- follows one release-service execution until it is built.
//!
//! Logs in (or reuses a token), optionally triggers the execution, then
//! polls its status and logs every transition. Exits once the execution
//! reaches `BUILT`, or on Ctrl-C.
//!
//! See [`PortalConfig::from_env`] for the environment variables.

use srs_poller::{PollEvent, PollOutcome};
use srs_portal::{PortalConfig, PortalContext};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "srs_portal=info,srs_poller=info,srs_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PortalConfig::from_env()?;
    let path = config.require_execution_path()?.clone();

    tracing::info!(
        api_url = %config.api_url,
        execution = %path,
        interval_ms = config.poll.interval.as_millis() as u64,
        "Starting srs-portal",
    );

    let ctx = PortalContext::new(config)?;
    let user = ctx.authenticate().await?;
    if !user.authenticated {
        tracing::warn!("Continuing without an authenticated session");
    }

    let mut view = ctx.open_execution(path).await?;
    tracing::info!(
        execution_id = %view.execution().id,
        status = %view.status(),
        created = view.execution().creation_time_display().as_deref().unwrap_or("unknown"),
        "Execution loaded",
    );

    let mut status_rx = view.subscribe();
    let mut events = ctx.poller.subscribe();

    if ctx.config.trigger && !view.execution().is_triggered() {
        view.trigger().await?;
    } else if !view.activate().await {
        anyhow::bail!("execution poller is already shut down");
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Received Ctrl-C, stopping");
                view.deactivate().await;
                break;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                tracing::info!(status = %status, title = status.title(), "Execution status");
                if status.is_terminal() {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(PollEvent::Stale { consecutive_failures, .. }) => {
                    tracing::warn!(consecutive_failures, "Execution status unknown, retrying");
                }
                Ok(PollEvent::Finished { execution_id, outcome })
                    if execution_id == view.execution().id
                        && !matches!(outcome, PollOutcome::Terminal(_)) =>
                {
                    // A replaced session also finishes as cancelled.
                    if view.is_active().await {
                        continue;
                    }
                    tracing::warn!(?outcome, "Polling ended before the execution was built");
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Poll event receiver lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    ctx.poller.shutdown().await;
    Ok(())
}
