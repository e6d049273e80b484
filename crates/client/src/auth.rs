//! Session credentials and the login flow.
//!
//! The API authenticates with HTTP Basic, using the session token as the
//! username and an empty password. [`AuthSession`] holds that token for the
//! lifetime of an application context; it is passed around explicitly.

use std::sync::RwLock;

use srs_core::error::CoreError;
use srs_core::model::{LoginResponse, User};
use srs_core::normalize::{decode, EntityKind};

use crate::api::{PortalApi, PortalApiError};
use crate::routes;

/// Attempts made by [`PortalApi::load_current_user`] before giving up.
const CURRENT_USER_ATTEMPTS: u32 = 2;

/// Holder of the current authentication token.
#[derive(Debug, Default)]
pub struct AuthSession {
    token: RwLock<Option<String>>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session seeded with a previously issued token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.into());
    }

    pub fn clear(&self) {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

impl PortalApi {
    /// Exchange credentials for a session token, then load the user it
    /// belongs to.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, PortalApiError> {
        self.session().clear();

        let response = self
            .client()
            .post(self.url_for(routes::LOGIN))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let payload = match Self::parse_response(response).await {
            Ok(payload) => payload,
            Err(PortalApiError::Api { status: 401 | 403, .. }) => {
                tracing::warn!(username, "Login rejected");
                return Err(CoreError::Unauthorized(format!("login rejected for {username}")).into());
            }
            Err(e) => return Err(e),
        };

        let login: LoginResponse = serde_json::from_value(payload)?;
        self.session().set_token(login.authentication_token);
        tracing::info!(username, "Logged in");

        self.load_current_user().await
    }

    /// Load the caller's identity, validating any held token.
    ///
    /// A token the server does not accept is cleared. Transport or server
    /// failures also clear it and the lookup is retried once anonymously.
    pub async fn load_current_user(&self) -> Result<User, PortalApiError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_user().await {
                Ok(user) => {
                    if !user.authenticated && self.session().is_authenticated() {
                        tracing::info!("Session token rejected, clearing it");
                        self.session().clear();
                    }
                    return Ok(user);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to load current user");
                    self.session().clear();
                    if attempt >= CURRENT_USER_ATTEMPTS {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Drop the session token and reload the (now anonymous) user.
    pub async fn logout(&self) -> Result<User, PortalApiError> {
        self.session().clear();
        tracing::info!("Logged out");
        self.load_current_user().await
    }

    async fn fetch_user(&self) -> Result<User, PortalApiError> {
        let response = self
            .authorized(self.client().get(self.url_for(routes::USER)))
            .send()
            .await?;
        let payload = Self::parse_response(response).await?;
        Ok(decode(EntityKind::User, payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_lifecycle() {
        let session = AuthSession::new();
        assert!(!session.is_authenticated());

        session.set_token("abc");
        assert_eq!(session.token().as_deref(), Some("abc"));

        session.clear();
        assert!(session.token().is_none());
    }

    #[test]
    fn seeded_session_is_authenticated() {
        assert!(AuthSession::with_token("t").is_authenticated());
    }
}
