//! The compiled solution record the runtime consumes

use crate::error::{NetworkError, Result};
use crate::interval::{input_slot, InputSynapseInterval, SynapseInterval};
use crate::network::{FeatureGroup, Network};
use crate::transfer::TransferFunction;

/// One compiled partition: a self-contained chunk of neurons with inputs and
/// outputs rewritten into partition-local coordinates.
///
/// Per inner neuron the partition-local weight table holds, in order, the
/// input-aligned weights, the bias weights and finally the spike coefficient,
/// so for neuron `n` the bias run is `bias_indices[n]..spike_indices[n]`.
/// Inside the local input lists, negative indices resolve through the gather
/// list (`input_data`) and non-negative indices address earlier inner neurons
/// of the same partition.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartialSolution {
    /// Number of neurons owned by this partition
    pub inner_neuron_count: u32,
    /// Global neuron index of each inner neuron, in declaration order
    pub neuron_indices: Vec<u32>,
    /// Gather list: what this partition reads before solving. Negative
    /// starts address the network input tape, non-negative starts address
    /// global neuron indices, at the annotated reach-back.
    pub input_data: Vec<InputSynapseInterval>,
    /// Scatter list: the global neuron slots this partition produces
    pub output_data: Vec<SynapseInterval>,
    /// Per-neuron input lists in local coordinates, flattened; delimited by
    /// `index_synapse_counts`
    pub inside_indices: Vec<SynapseInterval>,
    /// Number of `inside_indices` intervals belonging to each inner neuron
    pub index_synapse_counts: Vec<u32>,
    /// Flattened number of input-aligned weights of each inner neuron
    pub weight_counts: Vec<u32>,
    /// Partition-local weight values, synchronized from the network table
    pub weight_table: Vec<f64>,
    /// Network weight index every local weight slot was copied from
    pub weight_origins: Vec<u32>,
    /// Transfer function of each inner neuron
    pub transfer_functions: Vec<TransferFunction>,
    /// Local weight slot holding each inner neuron's spike coefficient
    pub spike_indices: Vec<u32>,
    /// Local weight slot where each inner neuron's bias run begins
    pub bias_indices: Vec<u32>,
}

impl PartialSolution {
    /// An empty partition ready to receive neurons.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattened length of the gather list.
    pub fn input_size(&self) -> u32 {
        self.input_data.iter().map(|span| span.size).sum()
    }

    /// Flattened length of the scatter list; equals the inner neuron count.
    pub fn output_size(&self) -> u32 {
        self.output_data.iter().map(|span| span.size).sum()
    }

    /// Measured memory footprint of the partition's arrays in bytes.
    pub fn estimated_bytes(&self) -> usize {
        use std::mem::size_of;
        self.neuron_indices.len() * size_of::<u32>()
            + self.input_data.len() * size_of::<InputSynapseInterval>()
            + self.output_data.len() * size_of::<SynapseInterval>()
            + self.inside_indices.len() * size_of::<SynapseInterval>()
            + self.index_synapse_counts.len() * size_of::<u32>()
            + self.weight_counts.len() * size_of::<u32>()
            + self.weight_table.len() * size_of::<f64>()
            + self.weight_origins.len() * size_of::<u32>()
            + self.transfer_functions.len() * size_of::<TransferFunction>()
            + self.spike_indices.len() * size_of::<u32>()
            + self.bias_indices.len() * size_of::<u32>()
    }

    /// Refresh the local weight copies from the network weight table.
    pub fn sync_weights(&mut self, network_weights: &[f64]) {
        for (slot, &origin) in self.weight_origins.iter().enumerate() {
            self.weight_table[slot] = network_weights[origin as usize];
        }
    }

    /// Verify the partition invariants: attribute vectors sized to the inner
    /// neuron count, per-neuron index/weight accounting in agreement, and
    /// every internal input index strictly preceding its neuron so a single
    /// pass in declaration order resolves all dependencies.
    pub fn validate(&self) -> Result<()> {
        let count = self.inner_neuron_count as usize;
        if count == 0 {
            return Err(NetworkError::malformed_partition("no inner neurons"));
        }
        for (name, len) in [
            ("neuron_indices", self.neuron_indices.len()),
            ("index_synapse_counts", self.index_synapse_counts.len()),
            ("weight_counts", self.weight_counts.len()),
            ("transfer_functions", self.transfer_functions.len()),
            ("spike_indices", self.spike_indices.len()),
            ("bias_indices", self.bias_indices.len()),
        ] {
            if len != count {
                return Err(NetworkError::malformed_partition(format!(
                    "{name} holds {len} entries for {count} inner neurons"
                )));
            }
        }
        if self.output_size() as usize != count {
            return Err(NetworkError::malformed_partition(format!(
                "output list covers {} slots for {count} inner neurons",
                self.output_size()
            )));
        }
        if self.weight_origins.len() != self.weight_table.len() {
            return Err(NetworkError::malformed_partition(
                "weight origins do not cover the weight table",
            ));
        }

        let total_spans: u32 = self.index_synapse_counts.iter().sum();
        if total_spans as usize != self.inside_indices.len() {
            return Err(NetworkError::malformed_partition(format!(
                "{} inside intervals declared, {} present",
                total_spans,
                self.inside_indices.len()
            )));
        }

        let gather_size = self.input_size() as usize;
        let mut span_cursor = 0usize;
        for neuron in 0..count {
            let mut input_count = 0u32;
            for span in
                &self.inside_indices[span_cursor..span_cursor + self.index_synapse_counts[neuron] as usize]
            {
                input_count += span.size;
                if span.start >= 0 {
                    let last = span.start as i64 + span.size as i64 - 1;
                    if last >= neuron as i64 {
                        return Err(NetworkError::malformed_partition(format!(
                            "inner neuron {neuron} reads inner index {last} ahead of itself"
                        )));
                    }
                } else {
                    let deepest = span.start as i64 - (span.size as i64 - 1);
                    if input_slot(deepest as i32) >= gather_size {
                        return Err(NetworkError::malformed_partition(format!(
                            "inner neuron {neuron} reads gather slot {} of {gather_size}",
                            input_slot(deepest as i32)
                        )));
                    }
                }
            }
            span_cursor += self.index_synapse_counts[neuron] as usize;
            if input_count != self.weight_counts[neuron] {
                return Err(NetworkError::malformed_partition(format!(
                    "inner neuron {neuron} pairs {input_count} inputs with {} weights",
                    self.weight_counts[neuron]
                )));
            }
            let (bias, spike) = (self.bias_indices[neuron], self.spike_indices[neuron]);
            if bias > spike || spike as usize >= self.weight_table.len() {
                return Err(NetworkError::malformed_partition(format!(
                    "inner neuron {neuron} has an inconsistent weight layout \
                     (bias {bias}, spike {spike}, table {})",
                    self.weight_table.len()
                )));
            }
        }
        Ok(())
    }
}

/// The compiled execution plan: a matrix of partitions plus metadata.
///
/// Rows are sequential dependency stages; partitions within a row are
/// independent and may be solved concurrently. A partition may depend on
/// partitions of earlier rows and on ring-buffer history, never on its own
/// row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solution {
    /// Width of the input tape the solution was compiled against
    pub network_input_size: u32,
    /// Total number of neurons produced per step
    pub neuron_count: u32,
    /// How many trailing neurons form the output layer
    pub output_neuron_count: u32,
    /// Activation history depth the runtime must provide
    pub memory_length: u32,
    /// Post-step transforms carried over from the network
    pub feature_groups: Vec<FeatureGroup>,
    /// The partition matrix, outer vector ordered by dependency stage
    pub rows: Vec<Vec<PartialSolution>>,
}

impl Solution {
    /// Total number of partitions across all rows.
    pub fn partition_count(&self) -> usize {
        self.rows.iter().map(|row| row.len()).sum()
    }

    /// Refresh every partition's local weight copies from the network.
    ///
    /// Call after an external trainer mutated the network weight table and
    /// before the next solve.
    pub fn sync_weights(&mut self, network: &Network) {
        for row in &mut self.rows {
            for partial in row {
                partial.sync_weights(&network.weights);
            }
        }
    }

    /// Validate every partition of the solution.
    pub fn validate(&self) -> Result<()> {
        for row in &self.rows {
            for partial in row {
                partial.validate()?;
            }
        }
        Ok(())
    }
}
