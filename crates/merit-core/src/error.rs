//! Unified error type for the dispatch workspace
//!
//! [`DispatchError`] covers the batch-level failures: malformed fleet,
//! profile or policy data, I/O on configuration files, and internal
//! aggregation bugs. Per-step infeasibility and solver failures are not
//! errors at this level; they travel as data in the step outcome.
//!
//! # Example
//!
//! ```ignore
//! use merit_core::{DispatchError, DispatchResult};
//!
//! fn prepare(fleet: Vec<Generator>) -> DispatchResult<Fleet> {
//!     let fleet = Fleet::new(fleet)?;
//!     Ok(fleet)
//! }
//! ```

use thiserror::Error;

/// Batch-level error for dispatch runs.
///
/// `Validation` and `Config` are both configuration failures in the sense
/// that they are detected before any solve and abort the whole run.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Fleet, profile or step data failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Policy or scheduler settings are unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration text could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors while reading or writing configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Result slots were written twice, out of range, or left empty.
    /// This is always an implementation bug.
    #[error("Aggregation consistency violated: {0}")]
    Aggregation(String),
}

impl DispatchError {
    /// True for errors that are caused by the caller's data or settings.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DispatchError::Validation(_) | DispatchError::Config(_) | DispatchError::Parse(_)
        )
    }
}

/// Convenience type alias for Results using DispatchError.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DispatchError::Validation("capacity must be finite".into());
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("capacity must be finite"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DispatchError = io_err.into();
        assert!(matches!(err, DispatchError::Io(_)));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(DispatchError::Config("segment_count".into()).is_configuration());
        assert!(DispatchError::Validation("fleet".into()).is_configuration());
        assert!(!DispatchError::Aggregation("slot 3 written twice".into()).is_configuration());
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> DispatchResult<()> {
            Err(DispatchError::Validation("test".into()))
        }

        fn outer() -> DispatchResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
