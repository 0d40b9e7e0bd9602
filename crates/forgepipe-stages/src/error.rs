use forgepipe_artifacts::ArtifactError;
use forgepipe_core::error::{ErrorCategory, ErrorKind, UserFriendlyError};
use forgepipe_router::RouterError;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Router(#[from] RouterError),

    /// The Code Generation stage's two-call fan-out: one side succeeded, the
    /// other failed. Both must succeed for the stage as a whole to succeed.
    #[error("code generation fan-out only partially succeeded: {which} failed: {source}")]
    PartialCodeGeneration { which: &'static str, source: RouterError },

    #[error("stage handler produced no output for required artifact '{0}'")]
    NoOutput(String),

    /// A repo-hoster or cloud-deployer collaborator call failed. Neither
    /// collaborator's own error taxonomy is specified, so failures here are
    /// treated as non-retryable until a concrete integration narrows that.
    #[error("{collaborator} call failed: {message}")]
    Collaborator { collaborator: &'static str, message: String },
}

impl UserFriendlyError for StageError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Artifact(e) => e.kind(),
            Self::Router(e) => e.kind(),
            Self::PartialCodeGeneration { source, .. } => source.kind(),
            Self::NoOutput(_) | Self::Collaborator { .. } => ErrorKind::Internal,
        }
    }

    fn user_message(&self) -> String {
        self.to_string()
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Artifact(e) => e.suggestions(),
            Self::Router(e) => e.suggestions(),
            Self::PartialCodeGeneration { source, .. } => source.suggestions(),
            Self::NoOutput(_) | Self::Collaborator { .. } => Vec::new(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Artifact(e) => e.is_retryable(),
            Self::Router(e) => e.is_retryable(),
            Self::PartialCodeGeneration { source, .. } => source.is_retryable(),
            Self::NoOutput(_) | Self::Collaborator { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        self.kind().category()
    }
}
