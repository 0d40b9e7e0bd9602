//! The Control API: a JSON/HTTP surface over the Pipeline Orchestrator, per
//! §4.K of the design. Routing is all this crate owns; every operation just
//! forwards to an [`forgepipe_orchestrator::Orchestrator`] and translates its
//! result (or error) onto the wire.

mod error;
mod routes;
mod server;
mod state;
mod stream;

pub use error::ApiError;
pub use server::{build_router, serve, ApiConfig};
pub use state::AppState;
