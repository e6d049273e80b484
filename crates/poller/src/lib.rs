//! Execution status polling.
//!
//! Keeps locally held [`ExecutionHandle`]s in step with the release
//! service by fetching their status at a fixed interval until a terminal
//! status is seen or polling is stopped.

pub mod config;
pub mod events;
pub mod handle;
pub mod manager;
pub mod session;

pub use config::PollConfig;
pub use events::PollEvent;
pub use handle::ExecutionHandle;
pub use manager::ExecutionPoller;
pub use session::{PollOutcome, PollSession};
