use forgepipe_core::error::{ErrorKind, UserFriendlyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration at {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl UserFriendlyError for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    fn user_message(&self) -> String {
        match self {
            Self::Read { path, .. } => format!("could not read configuration file {path}"),
            Self::Parse { path, .. } => format!("configuration file {path} is not valid TOML"),
            Self::Invalid { field, reason } => format!("configuration field {field} is invalid: {reason}"),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        vec!["check forgepipe.toml and FORGEPIPE_* environment overrides".to_string()]
    }
}
