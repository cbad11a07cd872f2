//! Error types for the network and solution model

use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Structural problems detected in a network or compiled solution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// A neuron record violates the model invariants
    #[error("neuron {neuron} is malformed: {reason}")]
    MalformedNeuron {
        /// Index of the offending neuron
        neuron: usize,
        /// What is wrong with it
        reason: String,
    },

    /// The declared output layer does not fit into the neuron array
    #[error("output neuron count {output_count} exceeds neuron count {neuron_count}")]
    OutputCountExceedsNeurons {
        /// Declared number of output neurons
        output_count: u32,
        /// Number of neurons in the network
        neuron_count: usize,
    },

    /// A network without outputs cannot be compiled or solved
    #[error("network declares no output neurons")]
    NoOutputs,

    /// The activation memory must keep at least the current step
    #[error("network memory length must be at least 1")]
    ZeroMemoryLength,

    /// A synapse reaches further into the past than the memory keeps
    #[error(
        "neuron {neuron} reaches {reach} steps into the past, \
         beyond what a memory length of {memory_length} retains"
    )]
    ReachBeyondMemory {
        /// Index of the offending neuron
        neuron: usize,
        /// The out-of-range reach-back value
        reach: u32,
        /// The network's declared memory length
        memory_length: u32,
    },

    /// A feature group references a neuron outside the network
    #[error("feature group {group} references index {index}, but the network has {neuron_count} neurons")]
    FeatureIndexOutOfBounds {
        /// Index of the offending feature group
        group: usize,
        /// The out-of-range neuron reference
        index: i32,
        /// Number of neurons in the network
        neuron_count: usize,
    },

    /// A compiled partition violates the solution invariants
    #[error("partition is malformed: {reason}")]
    MalformedPartition {
        /// What is wrong with it
        reason: String,
    },
}

impl NetworkError {
    /// Create a malformed-neuron error
    pub fn malformed_neuron(neuron: usize, reason: impl Into<String>) -> Self {
        Self::MalformedNeuron {
            neuron,
            reason: reason.into(),
        }
    }

    /// Create a malformed-partition error
    pub fn malformed_partition(reason: impl Into<String>) -> Self {
        Self::MalformedPartition {
            reason: reason.into(),
        }
    }
}
