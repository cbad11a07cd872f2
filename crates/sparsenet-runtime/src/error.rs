//! Error types for the solution runtime

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, SolveError>;

/// Errors surfaced while evaluating a compiled solution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// The provided input vector does not match the compiled input width
    #[error("input vector holds {got} values, the solution expects {expected}")]
    InputSizeMismatch {
        /// Input width the solution was compiled for
        expected: usize,
        /// Length of the vector handed to the solver
        got: usize,
    },

    /// The solution carries no partitions to solve
    #[error("solution has no partitions")]
    EmptySolution,

    /// A dependency stage without partitions cannot be scheduled
    #[error("solution row {row} has no partitions")]
    EmptyRow {
        /// Index of the empty row
        row: usize,
    },

    /// Invalid solve configuration
    #[error("invalid solve parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Rejected value
        value: String,
        /// Constraint description
        constraint: &'static str,
    },
}

impl SolveError {
    /// Create an invalid-parameter error
    pub fn invalid_parameter(
        parameter: &'static str,
        value: impl ToString,
        constraint: &'static str,
    ) -> Self {
        Self::InvalidParameter {
            parameter,
            value: value.to_string(),
            constraint,
        }
    }
}
