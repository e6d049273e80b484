//! Execution watcher for the release service.
//!
//! Wires the REST client and the execution poller into one explicit
//! [`PortalContext`], and exposes [`ExecutionView`] as the per-execution
//! unit that starts polling on activation and stops it on deactivation.

pub mod config;
pub mod state;

pub use config::{ConfigError, Credentials, PortalConfig};
pub use state::{ExecutionView, PortalContext, PortalError};
