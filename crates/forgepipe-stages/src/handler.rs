//! The seam between the stage table and a concrete stage implementation.

use async_trait::async_trait;
use forgepipe_core::stage::StageKey;

use crate::context::{StageContext, StageInputs};
use crate::error::StageError;

/// One stage's logic: build a request from `inputs`, call the Model Router
/// (possibly more than once, as the Code Generation stage does), and return
/// the bytes of every output artifact it produced. The orchestrator persists
/// the returned artifacts and decides retry/failure based on the `Result`.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn run(
        &self,
        ctx: &StageContext,
        stage: StageKey,
        inputs: &StageInputs,
    ) -> Result<Vec<(String, Vec<u8>)>, StageError>;
}
