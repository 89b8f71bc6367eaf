//! Error types for Reelcheck

use crate::types::ClassId;
use thiserror::Error;

/// Result type alias using Reelcheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// Reelcheck error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid test type: {0}")]
    InvalidTestType(String),

    #[error("unknown sub test case '{sub_case}' for test type '{test_type}'")]
    UnknownSubCase { test_type: String, sub_case: String },

    #[error("unknown run: {0}")]
    UnknownRun(String),

    #[error("flow already complete for run {0}")]
    FlowAlreadyComplete(String),

    #[error("class mismatch: expected {expected}, submitted {submitted}")]
    ClassMismatch {
        expected: ClassId,
        submitted: ClassId,
    },

    #[error("invalid image data: {0}")]
    InvalidImageData(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("detection timed out after {seconds}s")]
    DetectionTimeout { seconds: u64 },

    #[error("adapter failure: {0}")]
    Adapter(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is caused by bad client input rather than a
    /// server-side fault. Client errors are rejected before any run
    /// state is mutated.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidTestType(_)
                | Error::UnknownSubCase { .. }
                | Error::UnknownRun(_)
                | Error::FlowAlreadyComplete(_)
                | Error::ClassMismatch { .. }
                | Error::InvalidImageData(_)
                | Error::Validation(_)
        )
    }
}
