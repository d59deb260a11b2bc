use std::time::Duration;
use thiserror::Error;

/// Pilot error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PilotError {
    #[error("Session already active")]
    AlreadyActive,

    #[error("Session not active")]
    NotActive,

    #[error("Invalid engine state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration: {0}")]
    ConfigIo(String),

    #[error("Drone did not confirm disconnection within {0:?}")]
    DisconnectTimeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for pilot operations
pub type PilotResult<T> = Result<T, PilotError>;

impl PilotError {
    /// Poisoned lock on the shared session state
    pub(crate) fn lock(what: &str) -> Self {
        PilotError::Internal(format!("Failed to acquire {} lock", what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(PilotError::NotActive.to_string(), "Session not active");
        assert_eq!(
            PilotError::lock("engine").to_string(),
            "Internal error: Failed to acquire engine lock"
        );
        let timeout = PilotError::DisconnectTimeout(Duration::from_millis(1500));
        assert!(timeout.to_string().contains("1.5s"));
    }
}
