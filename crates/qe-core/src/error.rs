//! Error types for qesub

use thiserror::Error;

/// qesub error type
#[derive(Error, Debug)]
pub enum Error {
    /// Beam energy or target species inconsistent with the loaded data.
    ///
    /// Fatal: all downstream physics assumes a fixed beam/target, so the run
    /// must not continue.
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// Validation error (bad configuration values, misuse of an API)
    #[error("validation error: {0}")]
    Validation(String),

    /// Species counts do not match the expected transition case.
    ///
    /// This is a programming error, not a physics outcome; the run aborts
    /// with enough context to locate the offending event.
    #[error("combinatorial invariant violation: event {event_id}, bucket {bucket}, case {case}: {details}")]
    CombinatorialInvariant {
        /// Identifier of the event being processed
        event_id: u64,
        /// Multiplicity bucket the event was drawn from
        bucket: u32,
        /// Name of the topology-transition case
        case: &'static str,
        /// What went wrong
        details: String,
    },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
