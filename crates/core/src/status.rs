//! Execution status model.
//!
//! The wire form is the upper-snake name (`BEFORE_TRIGGER`, `QUEUED`,
//! `BUILDING`, `BUILT`). Progression is typically in that order but nothing
//! here enforces it; the server is the authority.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle state of a remote build execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created and configured, not yet triggered.
    BeforeTrigger,
    /// Triggered and waiting for a builder.
    Queued,
    /// A builder is running the execution.
    Building,
    /// Finished. The only terminal state.
    Built,
}

impl ExecutionStatus {
    pub const ALL: [ExecutionStatus; 4] = [
        ExecutionStatus::BeforeTrigger,
        ExecutionStatus::Queued,
        ExecutionStatus::Building,
        ExecutionStatus::Built,
    ];

    /// Wire name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::BeforeTrigger => "BEFORE_TRIGGER",
            ExecutionStatus::Queued => "QUEUED",
            ExecutionStatus::Building => "BUILDING",
            ExecutionStatus::Built => "BUILT",
        }
    }

    /// No further transition is expected once a status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Built)
    }

    /// Whether the execution has been triggered.
    pub fn is_triggered(self) -> bool {
        !matches!(self, ExecutionStatus::BeforeTrigger)
    }

    /// Human-readable label for display.
    pub fn title(self) -> &'static str {
        match self {
            ExecutionStatus::BeforeTrigger => "Before Trigger",
            ExecutionStatus::Queued => "Queued",
            ExecutionStatus::Building => "Building",
            ExecutionStatus::Built => "Built",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn only_built_is_terminal() {
        let terminal: Vec<_> = ExecutionStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, [ExecutionStatus::Built]);
    }

    #[test]
    fn before_trigger_is_not_triggered() {
        assert!(!ExecutionStatus::BeforeTrigger.is_triggered());
        assert!(ExecutionStatus::Queued.is_triggered());
        assert!(ExecutionStatus::Built.is_triggered());
    }

    #[test]
    fn wire_names_match_serde() {
        for status in ExecutionStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().into()));
            assert_eq!(status.as_str().parse::<ExecutionStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_matches!(
            "FAILED".parse::<ExecutionStatus>(),
            Err(CoreError::UnknownStatus(name)) if name == "FAILED"
        );
        assert!("built".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn titles() {
        assert_eq!(ExecutionStatus::BeforeTrigger.title(), "Before Trigger");
        assert_eq!(ExecutionStatus::Building.to_string(), "BUILDING");
    }
}
