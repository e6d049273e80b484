//! REST client for the release-service HTTP API.
//!
//! Wraps the `api/v1` endpoints using [`reqwest`]. Every JSON body goes
//! through [`normalize_payload`] before it reaches a caller, so entities
//! always arrive with their `links` resolved.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use srs_core::error::CoreError;
use srs_core::execution::{FetchError, StatusResponse, StatusSource};
use srs_core::normalize::{decode, normalize_payload, EntityKind};
use srs_core::status::ExecutionStatus;
use srs_core::types::Payload;

use crate::auth::AuthSession;

/// HTTP client for one release-service deployment.
#[derive(Clone)]
pub struct PortalApi {
    client: reqwest::Client,
    base_url: String,
    session: Arc<AuthSession>,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum PortalApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The body was not valid JSON.
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The payload could not be normalized into the expected entity.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PortalApi {
    /// Create a new API client.
    ///
    /// * `base_url` - API root including the namespace, e.g.
    ///   `http://host:8080/api/v1`. A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>, session: Arc<AuthSession>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, session)
    }

    /// Create a client with a per-request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        session: Arc<AuthSession>,
        timeout: Duration,
    ) -> Result<Self, PortalApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, session))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<AuthSession>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Absolute URL for `path`. Paths that are already absolute URLs (as
    /// found in `links`) are used verbatim.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// `GET` a path and return its normalized payload.
    pub async fn get_payload(&self, path: &str, kind: EntityKind) -> Result<Payload, PortalApiError> {
        let response = self.authorized(self.client.get(self.url_for(path))).send().await?;
        let payload = Self::parse_response(response).await?;
        Ok(normalize_payload(kind, payload)?)
    }

    /// `GET` a path and decode it into a typed entity.
    pub async fn get_entity<T: DeserializeOwned>(
        &self,
        path: &str,
        kind: EntityKind,
    ) -> Result<T, PortalApiError> {
        let response = self.authorized(self.client.get(self.url_for(path))).send().await?;
        let payload = Self::parse_response(response).await?;
        Ok(decode(kind, payload)?)
    }

    /// `POST` to a path with an optional JSON body and decode the reply.
    pub async fn post_entity<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&Payload>,
        kind: EntityKind,
    ) -> Result<T, PortalApiError> {
        let mut request = self.client.post(self.url_for(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.authorized(request).send().await?;
        let payload = Self::parse_response(response).await?;
        Ok(decode(kind, payload)?)
    }

    /// `PUT` a full entity body and decode the reply.
    pub async fn put_entity<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Payload,
        kind: EntityKind,
    ) -> Result<T, PortalApiError> {
        let request = self.client.put(self.url_for(path)).json(body);
        let response = self.authorized(request).send().await?;
        let payload = Self::parse_response(response).await?;
        Ok(decode(kind, payload)?)
    }

    /// `DELETE` a path. Any reply body is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), PortalApiError> {
        let response = self
            .authorized(self.client.delete(self.url_for(path)))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// `GET` a path as plain text.
    pub async fn get_text(&self, path: &str) -> Result<String, PortalApiError> {
        let response = self.authorized(self.client.get(self.url_for(path))).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.text().await?)
    }

    /// `POST` a multipart form. Any reply body is ignored.
    pub async fn post_multipart(&self, path: &str, form: Form) -> Result<(), PortalApiError> {
        let response = self
            .authorized(self.client.post(self.url_for(path)).multipart(form))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- crate helpers ----

    /// Attach the session's credentials, if any.
    pub(crate) fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.token() {
            Some(token) => request.basic_auth(token, Some("")),
            None => request,
        }
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`PortalApiError::Api`]
    /// containing the status and body text on failure.
    pub(crate) async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PortalApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PortalApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body. An empty body reads as
    /// `null`.
    pub(crate) async fn parse_response(response: reqwest::Response) -> Result<Payload, PortalApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Payload::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl StatusSource for PortalApi {
    async fn fetch_status(&self, status_url: &str) -> Result<ExecutionStatus, FetchError> {
        let response = self
            .authorized(self.client.get(self.url_for(status_url)))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let payload = Self::parse_response(response).await.map_err(|e| match e {
            PortalApiError::Api { status, body } => FetchError::Http { status, body },
            PortalApiError::Request(e) => FetchError::Transport(e.to_string()),
            other => FetchError::Decode(other.to_string()),
        })?;

        let body: StatusResponse = serde_json::from_value(payload)
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::trace!(status_url, status = %body.status, "Fetched execution status");
        Ok(body.status)
    }
}
