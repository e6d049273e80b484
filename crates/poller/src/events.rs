//! Events emitted by execution polling.
//!
//! Status itself is observed through the handle; these events add what a
//! status value alone cannot show, such as repeated fetch failures.

use serde::Serialize;
use srs_core::status::ExecutionStatus;
use srs_core::types::EntityId;

use crate::session::PollOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PollEvent {
    /// A fetch returned a status different from the one held.
    StatusChanged {
        execution_id: EntityId,
        previous: ExecutionStatus,
        status: ExecutionStatus,
    },

    /// A fetch failed; the held status was left as is.
    FetchFailed {
        execution_id: EntityId,
        consecutive_failures: u32,
        /// Human-readable error description.
        error: String,
    },

    /// Fetches have failed often enough in a row that the held status
    /// should be shown as unknown. Emitted once per failure streak.
    Stale {
        execution_id: EntityId,
        consecutive_failures: u32,
    },

    /// The session ended and will issue no further fetches.
    Finished {
        execution_id: EntityId,
        outcome: PollOutcome,
    },
}
