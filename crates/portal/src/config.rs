use std::fmt;

use srs_client::routes::ExecutionPath;
use srs_poller::config::{PollConfig, PollConfigError};

/// Default API root, including the `api/v1` namespace.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Username and password used to obtain a session token.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} environment variable is required")]
    Missing { var: &'static str },

    #[error("{var} is invalid (`{value}`): {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Poll(#[from] PollConfigError),
}

/// Portal configuration loaded from environment variables.
///
/// Every field except the execution path has a default suitable for a
/// local release service.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// API root (default: `http://localhost:8080/api/v1`).
    pub api_url: String,
    /// Pre-issued session token. Ignored when credentials are set.
    pub auth_token: Option<String>,
    /// Login credentials, present only when both halves are set.
    pub credentials: Option<Credentials>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub poll: PollConfig,
    /// Execution to watch, as `center/extension/product/build/execution`.
    pub execution_path: Option<ExecutionPath>,
    /// Trigger the execution before watching it (default: `false`).
    pub trigger: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            auth_token: None,
            credentials: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll: PollConfig::default(),
            execution_path: None,
            trigger: false,
        }
    }
}

impl PortalConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                        |
    /// |------------------------|--------------------------------|
    /// | `SRS_API_URL`          | `http://localhost:8080/api/v1` |
    /// | `SRS_AUTH_TOKEN`       | --                             |
    /// | `SRS_USERNAME`         | --                             |
    /// | `SRS_PASSWORD`         | --                             |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                           |
    /// | `SRS_POLL_INTERVAL_MS` | `1000`                         |
    /// | `SRS_POLL_STALE_AFTER` | `3`                            |
    /// | `SRS_EXECUTION_PATH`   | --                             |
    /// | `SRS_TRIGGER`          | `false`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("SRS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let auth_token = non_empty("SRS_AUTH_TOKEN");

        let credentials = match (non_empty("SRS_USERNAME"), non_empty("SRS_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        let request_timeout_secs = match non_empty("REQUEST_TIMEOUT_SECS") {
            Some(value) => value.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "REQUEST_TIMEOUT_SECS",
                    value,
                    reason: e.to_string(),
                }
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let poll = PollConfig::from_lookup(&lookup)?;

        let execution_path = non_empty("SRS_EXECUTION_PATH")
            .map(|value| {
                value.parse().map_err(|e: srs_core::error::CoreError| ConfigError::Invalid {
                    var: "SRS_EXECUTION_PATH",
                    value,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let trigger = match non_empty("SRS_TRIGGER") {
            Some(value) => parse_flag("SRS_TRIGGER", value)?,
            None => false,
        };

        Ok(Self {
            api_url,
            auth_token,
            credentials,
            request_timeout_secs,
            poll,
            execution_path,
            trigger,
        })
    }

    /// The execution to watch, which the binary cannot run without.
    pub fn require_execution_path(&self) -> Result<&ExecutionPath, ConfigError> {
        self.execution_path.as_ref().ok_or(ConfigError::Missing {
            var: "SRS_EXECUTION_PATH",
        })
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected true or false".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = PortalConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.poll.interval, Duration::from_millis(1000));
        assert!(config.auth_token.is_none());
        assert!(config.credentials.is_none());
        assert!(config.execution_path.is_none());
        assert!(!config.trigger);
    }

    #[test]
    fn reads_every_variable() {
        let config = PortalConfig::from_lookup(lookup(&[
            ("SRS_API_URL", "https://srs.example.org/api/v1"),
            ("SRS_AUTH_TOKEN", "tok"),
            ("SRS_USERNAME", "alice"),
            ("SRS_PASSWORD", "secret"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("SRS_POLL_INTERVAL_MS", "250"),
            ("SRS_EXECUTION_PATH", "c/e/p/b/x"),
            ("SRS_TRIGGER", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://srs.example.org/api/v1");
        assert_eq!(config.auth_token.as_deref(), Some("tok"));
        assert_matches!(config.credentials, Some(Credentials { ref username, .. }) if username == "alice");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert_eq!(config.execution_path.unwrap().execution, "x");
        assert!(config.trigger);
    }

    #[test]
    fn credentials_need_both_halves() {
        let config = PortalConfig::from_lookup(lookup(&[("SRS_USERNAME", "alice")])).unwrap();
        assert!(config.credentials.is_none());
    }

    #[test]
    fn password_is_not_printed() {
        let creds = Credentials {
            username: "alice".into(),
            password: "secret".into(),
        };
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert_matches!(
            PortalConfig::from_lookup(lookup(&[("REQUEST_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::Invalid { var: "REQUEST_TIMEOUT_SECS", .. })
        );
        assert_matches!(
            PortalConfig::from_lookup(lookup(&[("SRS_POLL_INTERVAL_MS", "-1")])),
            Err(ConfigError::Poll(_))
        );
        assert_matches!(
            PortalConfig::from_lookup(lookup(&[("SRS_EXECUTION_PATH", "c/e/p")])),
            Err(ConfigError::Invalid { var: "SRS_EXECUTION_PATH", .. })
        );
        assert_matches!(
            PortalConfig::from_lookup(lookup(&[("SRS_TRIGGER", "maybe")])),
            Err(ConfigError::Invalid { var: "SRS_TRIGGER", .. })
        );
    }

    #[test]
    fn missing_execution_path_is_reported() {
        let config = PortalConfig::default();
        assert_matches!(
            config.require_execution_path(),
            Err(ConfigError::Missing { var: "SRS_EXECUTION_PATH" })
        );
    }
}
