//! HTTP API layer for the tracker.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
