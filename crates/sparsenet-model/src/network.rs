//! The declarative network record the compiler consumes

use crate::interval::{InputSynapseInterval, SynapseInterval};
use crate::transfer::TransferFunction;

/// One node of the network: weighted fan-in, a transfer function and a
/// first-order memory filter.
///
/// Input indices and input weights are parallel when flattened: the `k`-th
/// expanded input index is weighted by the `k`-th expanded weight reference.
/// Weight references beyond the last input index are the neuron's biases.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Neuron {
    /// Transfer function applied to the weighted input sum
    pub transfer_function: TransferFunction,
    /// Index of the spike (memory filter) coefficient in the weight table
    pub spike_weight_index: u32,
    /// Where this neuron takes its inputs from, as signed synapse intervals
    pub input_indices: Vec<InputSynapseInterval>,
    /// Which weight table entries scale those inputs; the unmatched tail
    /// holds bias references
    pub input_weights: Vec<SynapseInterval>,
}

impl Neuron {
    /// Flattened number of input indices, i.e. the neuron's fan-in.
    pub fn input_count(&self) -> u32 {
        self.input_indices.iter().map(|span| span.size).sum()
    }

    /// Flattened number of weight references, biases included.
    pub fn weight_count(&self) -> u32 {
        self.input_weights.iter().map(|span| span.size).sum()
    }

    /// Number of trailing bias references.
    pub fn bias_count(&self) -> u32 {
        self.weight_count().saturating_sub(self.input_count())
    }
}

/// Declared recurrence topology of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecurrenceKind {
    /// No synapse reaches into previous steps
    #[default]
    None,
    /// Neurons feed their own previous activation back to themselves
    ToSelf,
    /// Neurons take the previous activations of their whole layer
    ToLayer,
}

/// Post-activation transforms a feature group may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatureKind {
    /// Numerically stable softmax over the group's neurons
    Softmax,
}

/// A declarative transform applied over a set of neurons after every solved
/// step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureGroup {
    /// The transform to apply
    pub kind: FeatureKind,
    /// Which neurons it covers, as non-negative index intervals
    pub relevant_neurons: Vec<SynapseInterval>,
}

/// A complete sparse network: neurons over a shared weight table plus the
/// metadata the compiler and runtime need.
///
/// The output layer is positional: the final `output_neuron_count` entries of
/// the neuron array are the network outputs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Network {
    /// Width of the external input tape
    pub input_size: u32,
    /// How many trailing neurons form the output layer
    pub output_neuron_count: u32,
    /// The neuron array
    pub neurons: Vec<Neuron>,
    /// The global weight table every neuron references into
    pub weights: Vec<f64>,
    /// Declared recurrence topology
    pub recurrence: RecurrenceKind,
    /// How many steps of activation history the network requires
    pub memory_length: u32,
    /// Post-step transforms over neuron subsets
    pub feature_groups: Vec<FeatureGroup>,
}

impl Network {
    /// Number of neurons in the network.
    pub fn neuron_count(&self) -> usize {
        self.neurons.len()
    }

    /// Index of the first output-layer neuron.
    pub fn first_output_index(&self) -> usize {
        self.neurons.len() - self.output_neuron_count as usize
    }
}
