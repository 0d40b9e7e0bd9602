use forgepipe_core::error::{ErrorCategory, ErrorKind, UserFriendlyError};
use forgepipe_core::ids::BuildId;
use forgepipe_cost::CostError;
use forgepipe_stages::StageError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("no such build {0}")]
    NoSuchBuild(BuildId),

    #[error("build {0} is not in a terminal state and cannot be retried")]
    NotTerminal(BuildId),

    #[error(transparent)]
    Cost(#[from] CostError),

    #[error(transparent)]
    Stage(#[from] StageError),
}

impl UserFriendlyError for OrchestratorError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuchBuild(_) => ErrorKind::NotFound,
            Self::NotTerminal(_) => ErrorKind::Validation,
            Self::Cost(e) => e.kind(),
            Self::Stage(e) => e.kind(),
        }
    }

    fn user_message(&self) -> String {
        self.to_string()
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Cost(e) => e.suggestions(),
            Self::Stage(e) => e.suggestions(),
            _ => Vec::new(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Cost(e) => e.is_retryable(),
            Self::Stage(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        self.kind().category()
    }
}
