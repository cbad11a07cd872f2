//! Error types for the partition compiler

use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors surfaced while compiling a network into a solution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The network failed structural validation
    #[error("malformed network: {0}")]
    Malformed(#[from] sparsenet_model::NetworkError),

    /// A single neuron alone does not fit into the device budget
    #[error(
        "neuron {neuron} alone needs an estimated {estimated} bytes, \
         exceeding the device budget of {budget} bytes"
    )]
    BudgetExhausted {
        /// Index of the oversized neuron
        neuron: usize,
        /// Its estimated footprint in bytes
        estimated: usize,
        /// The configured device budget in bytes
        budget: usize,
    },

    /// The router made no progress although unprocessed neurons remain,
    /// which means the dependency graph contains a cycle
    #[error(
        "structural cycle: no neuron became solvable although {unprocessed} remain unprocessed"
    )]
    StructuralCycle {
        /// How many neurons were still unprocessed when the router stalled
        unprocessed: usize,
    },

    /// Invalid compile configuration
    #[error("invalid compile parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Rejected value
        value: String,
        /// Constraint description
        constraint: &'static str,
    },
}

impl CompileError {
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
