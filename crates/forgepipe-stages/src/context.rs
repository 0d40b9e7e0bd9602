//! Everything a stage handler needs to assemble a prompt and persist its
//! output, threaded in explicitly rather than reached for through a
//! singleton.

use std::collections::BTreeMap;
use std::sync::Arc;

use forgepipe_core::ids::{BuildId, ProjectId, TenantId, UserId};
use forgepipe_router::ModelRouter;

/// Everything a handler needs to call the Model Router. Deliberately does
/// not carry the Artifact Store: the orchestrator owns every artifact read
/// and write, so a handler only ever sees bytes already read for it and
/// hands back bytes for the orchestrator to persist.
#[derive(Clone)]
pub struct StageContext {
    pub build_id: BuildId,
    pub tenant: TenantId,
    pub user: UserId,
    pub project: ProjectId,
    pub router: Arc<ModelRouter>,
}

/// The build spec plus whatever artifacts a stage declared as inputs, read
/// from the Artifact Store by the orchestrator's preflight step and handed
/// to the handler so it never has to know artifact names itself.
pub struct StageInputs {
    pub original_spec: serde_json::Value,
    pub artifacts: BTreeMap<String, Vec<u8>>,
}

impl StageInputs {
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.artifacts
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}
