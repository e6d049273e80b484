use std::time::Duration;

/// Default delay between the end of one status fetch and the next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of consecutive failed fetches before a status is
/// reported as stale.
pub const DEFAULT_STALE_AFTER_FAILURES: u32 = 3;

/// Tunable parameters for execution status polling.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed delay between fetches. There is no backoff.
    pub interval: Duration,
    /// Consecutive failures after which a `Stale` event is emitted.
    /// `0` disables the indicator.
    pub stale_after_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            stale_after_failures: DEFAULT_STALE_AFTER_FAILURES,
        }
    }
}

/// A poll setting read from the environment was not a valid number.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a non-negative integer, got `{value}`")]
pub struct PollConfigError {
    pub var: &'static str,
    pub value: String,
}

impl PollConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default |
    /// |------------------------|---------|
    /// | `SRS_POLL_INTERVAL_MS` | `1000`  |
    /// | `SRS_POLL_STALE_AFTER` | `3`     |
    pub fn from_env() -> Result<Self, PollConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PollConfigError> {
        let defaults = Self::default();

        let interval = match parse_var(&lookup, "SRS_POLL_INTERVAL_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.interval,
        };

        let stale_after_failures = match parse_var(&lookup, "SRS_POLL_STALE_AFTER")? {
            Some(n) => u32::try_from(n).map_err(|_| PollConfigError {
                var: "SRS_POLL_STALE_AFTER",
                value: n.to_string(),
            })?,
            None => defaults.stale_after_failures,
        };

        Ok(Self {
            interval,
            stale_after_failures,
        })
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, PollConfigError> {
    lookup(var)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|_| PollConfigError {
                var,
                value,
            })
        })
        .transpose()
}
