//! Error taxonomy surfaced by the productivity engine.

use thiserror::Error;

/// Errors returned by [`crate::tracker::ProductionTracker`] operations.
///
/// Every variant is reported synchronously; the engine never retries. A
/// failed operation leaves the operator's in-memory state untouched.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Unknown operator or task.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operator deactivated or without an active task assignment.
    #[error("inactive: {0}")]
    Inactive(String),

    /// Transition not allowed from the operator's current pause state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Malformed identifiers or payload values.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing store failed to read or write a record.
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    /// The task running a state transition panicked before finishing.
    #[error("transition aborted: {0}")]
    Aborted(String),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_storage_error_keeps_context_chain() {
        let err: TrackerError = anyhow!("disk full").context("failed to insert cycle").into();
        assert_eq!(
            err.to_string(),
            "storage error: failed to insert cycle: disk full"
        );
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            TrackerError::InvalidState("pause already open".into()).to_string(),
            "invalid state: pause already open"
        );
        assert_eq!(
            TrackerError::NotFound("operator 9".into()).to_string(),
            "not found: operator 9"
        );
    }
}
