//! Network and solution data model for the sparsenet compiler and runtime
//!
//! The model is index-based throughout: neurons reference their inputs via
//! compact synapse intervals over signed indices, where the negative
//! half-plane addresses the external input tape and the non-negative
//! half-plane addresses other neurons. No part of the model holds references
//! into another part; every relation is index arithmetic over flat arrays.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod interval;
pub mod iterator;
pub mod network;
pub mod solution;
pub mod transfer;
pub mod validate;

pub use error::{NetworkError, Result};
pub use interval::{
    input_reference, input_slot, is_input_reference, InputSynapseInterval, SynapseInterval,
    SynapseSpan,
};
pub use iterator::SynapseIterator;
pub use network::{FeatureGroup, FeatureKind, Network, Neuron, RecurrenceKind};
pub use solution::{PartialSolution, Solution};
pub use transfer::{spike_derivative, spike_value, TransferFunction};
pub use validate::{neuron_estimated_bytes, validate_network};
