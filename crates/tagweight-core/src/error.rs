//! Error types for tag registration, normalization, and aggregation.

use thiserror::Error;

/// Tag engine error type.
///
/// Configuration and caller errors are distinct variants so that callers can
/// tell "no aggregation configured" apart from an empty aggregate. Backend
/// failures from a store are carried through as [`TagError::Store`].
#[derive(Error, Debug)]
pub enum TagError {
    /// Raw tag input was neither a string nor a list.
    #[error("Invalid tags format: expected a string or a list of strings, got {0}")]
    InvalidFormat(String),

    /// Query against a context that has no aggregation strategy installed.
    #[error("Aggregation strategy missing for context '{context}'")]
    AggregationStrategyMissing { context: String },

    /// Context name was never registered on the document type.
    #[error("Unknown tag context '{context}'")]
    UnknownContext { context: String },

    /// Context registered twice with different settings.
    #[error("Tag context '{context}' is already registered with different options")]
    DuplicateContext { context: String },

    /// A removed configuration option was supplied.
    #[error("Option '{option}' has been removed. {hint}")]
    RemovedOption { option: String, hint: String },

    /// Strategy name did not match any known strategy.
    #[error("Unknown aggregation strategy '{name}'. Must be batch, incremental, or incremental_grouped.")]
    UnknownStrategy { name: String },

    /// A group was requested on a context that is not aggregated by group.
    #[error("Tag context '{context}' is not aggregated by group")]
    NotGrouped { context: String },

    /// Underlying store failure.
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Result type for tag engine operations.
pub type TagResult<T> = Result<T, TagError>;
