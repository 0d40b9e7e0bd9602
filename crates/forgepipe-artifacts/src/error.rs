use forgepipe_core::error::{ErrorKind, UserFriendlyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact {name} not found for build {build_id}")]
    Missing { build_id: String, name: String },

    #[error("failed to write artifact {name} for build {build_id}: {source}")]
    Write {
        build_id: String,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize artifact {name} for build {build_id}: {source}")]
    Serialize {
        build_id: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl UserFriendlyError for ArtifactError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Missing { .. } => ErrorKind::MissingInputArtifact,
            Self::Write { .. } | Self::Serialize { .. } => ErrorKind::ArtifactWriteError,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Missing { name, .. } => format!("required artifact '{name}' was not produced"),
            Self::Write { name, .. } => format!("failed to persist artifact '{name}'"),
            Self::Serialize { name, .. } => format!("artifact '{name}' could not be serialized"),
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}
