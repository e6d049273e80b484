//! Status-source collaborator for execution polling.
//!
//! The poller only needs "give me the current status behind this URL".
//! [`StatusSource`] is that seam; the REST client implements it over HTTP
//! and tests implement it with scripted responses.

use async_trait::async_trait;
use serde::Deserialize;

use crate::status::ExecutionStatus;

/// Minimal body shape returned by an execution status endpoint. Any other
/// fields in the body are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: ExecutionStatus,
}

/// A failed status fetch. The poller treats every variant as transient.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("status endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The body did not carry a recognised status.
    #[error("undecodable status body: {0}")]
    Decode(String),
}

/// Fetches the current status of one execution.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, status_url: &str) -> Result<ExecutionStatus, FetchError>;
}
