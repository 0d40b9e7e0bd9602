//! Budget denial, classified so the Orchestrator's retry loop treats it as
//! the non-retryable terminal failure the taxonomy says it is.

use forgepipe_core::error::{ErrorCategory, ErrorKind, UserFriendlyError};

#[derive(Debug, thiserror::Error)]
pub enum CostError {
    #[error("{limit_name} of {limit:.4} would be exceeded (currently at {current:.4})")]
    Denied {
        limit_name: String,
        limit: f64,
        current: f64,
    },

    #[error("new builds are paused: emergency stop is active")]
    EmergencyStopActive,
}

impl UserFriendlyError for CostError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::CostDenied
    }

    fn user_message(&self) -> String {
        self.to_string()
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Denied { limit_name, .. } => {
                vec![format!("raise {limit_name}, or wait for its window to roll over")]
            }
            Self::EmergencyStopActive => {
                vec!["clear the emergency stop once spend is understood".to_string()]
            }
        }
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Budget
    }
}
