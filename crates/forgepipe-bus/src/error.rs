//! Progress Bus failures. There are few of these: publishing and subscribing
//! to a not-yet-created topic both succeed (the topic is created lazily), so
//! the only failure is asking about a build whose topic was already closed.

use forgepipe_core::error::{ErrorCategory, ErrorKind, UserFriendlyError};

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("no progress topic for build {0} (it may have already been closed)")]
    NoSuchTopic(String),
}

impl UserFriendlyError for BusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NotFound
    }

    fn user_message(&self) -> String {
        self.to_string()
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::NotFound
    }
}
