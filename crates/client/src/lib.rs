//! Release-service REST client.
//!
//! [`PortalApi`](api::PortalApi) speaks to the `api/v1` namespace with the
//! session's credentials, normalizes every payload, and doubles as the
//! [`StatusSource`](srs_core::execution::StatusSource) the execution poller
//! fetches through.

pub mod api;
pub mod auth;
pub mod resources;
pub mod routes;

pub use api::{PortalApi, PortalApiError};
pub use auth::AuthSession;
