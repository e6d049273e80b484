//! Domain core for the release-service portal.
//!
//! Holds everything that does not touch the network: hypermedia link
//! resolution over decoded payloads, the execution status model, typed
//! entities, per-entity payload normalization, and the status-source
//! collaborator trait the poller fetches through.

pub mod error;
pub mod execution;
pub mod hypermedia;
pub mod model;
pub mod normalize;
pub mod status;
pub mod types;
