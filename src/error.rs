//! Custom error types used throughout the crate.
use thiserror::Error;

/// Errors surfaced by classifiers and data utilities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// Input does not satisfy a caller contract, e.g. mismatched shapes.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// `predict` was called before a successful `fit`.
    #[error("the classifier has not been fitted yet")]
    NotFitted,
}
