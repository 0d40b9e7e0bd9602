use std::sync::Arc;

use forgepipe_orchestrator::Orchestrator;

/// Shared state handed to every route. Routing is all this crate owns; the
/// business state lives in the orchestrator it wraps.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub type SharedState = Arc<AppState>;
