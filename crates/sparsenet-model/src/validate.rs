//! Network validation and size estimation
//!
//! Everything here runs before compilation: a network that passes is safe
//! for the router and partition builder to index into without further
//! checks.

use std::mem::size_of;

use crate::error::{NetworkError, Result};
use crate::interval::{is_input_reference, SynapseInterval};
use crate::network::{Network, Neuron};

/// Fixed per-neuron bookkeeping cost in a compiled partition, on top of the
/// per-synapse data.
const NEURON_OVERHEAD_BYTES: usize = 32;

/// Estimated contribution of one neuron to a partition's byte footprint.
///
/// Counts the local index intervals, the weight copies with their origin
/// bookkeeping, and a constant per-neuron overhead. The router accumulates
/// this estimate while collecting; the builder measures the actually emitted
/// size when partitions close, so the estimate leans towards the compact
/// layout interval merging produces rather than the worst case.
pub fn neuron_estimated_bytes(neuron: &Neuron) -> usize {
    let index_count = neuron.input_count() as usize;
    let weight_count = neuron.weight_count() as usize;
    let index_bytes = index_count * size_of::<SynapseInterval>();
    // Every weight plus the spike coefficient lands in the local table with
    // an origin entry.
    let weight_bytes = (weight_count + 1) * (size_of::<f64>() + size_of::<u32>());
    index_bytes + weight_bytes + NEURON_OVERHEAD_BYTES
}

/// Check a network against the model invariants.
///
/// Verifies the output layer fits, the memory length covers every declared
/// reach-back, every neuron's weight references stay inside the weight
/// table, input references stay inside the neuron array or the input tape,
/// and the input/weight accounting (with its bias allowance) holds.
pub fn validate_network(network: &Network) -> Result<()> {
    if network.output_neuron_count == 0 {
        return Err(NetworkError::NoOutputs);
    }
    if network.output_neuron_count as usize > network.neurons.len() {
        return Err(NetworkError::OutputCountExceedsNeurons {
            output_count: network.output_neuron_count,
            neuron_count: network.neurons.len(),
        });
    }
    if network.memory_length == 0 {
        return Err(NetworkError::ZeroMemoryLength);
    }

    for (index, neuron) in network.neurons.iter().enumerate() {
        validate_neuron(network, index, neuron)?;
    }

    for (group_index, group) in network.feature_groups.iter().enumerate() {
        for span in &group.relevant_neurons {
            let last = span.start as i64 + span.size as i64 - 1;
            if span.start < 0 || last >= network.neurons.len() as i64 {
                return Err(NetworkError::FeatureIndexOutOfBounds {
                    group: group_index,
                    index: if span.start < 0 { span.start } else { last as i32 },
                    neuron_count: network.neurons.len(),
                });
            }
        }
    }
    Ok(())
}

fn validate_neuron(network: &Network, index: usize, neuron: &Neuron) -> Result<()> {
    let input_count = neuron.input_count();
    let weight_count = neuron.weight_count();
    if weight_count < input_count {
        return Err(NetworkError::malformed_neuron(
            index,
            format!("{input_count} input indices but only {weight_count} weight references"),
        ));
    }
    if neuron.spike_weight_index as usize >= network.weights.len() {
        return Err(NetworkError::malformed_neuron(
            index,
            format!(
                "spike weight index {} outside the weight table of {}",
                neuron.spike_weight_index,
                network.weights.len()
            ),
        ));
    }

    for span in &neuron.input_indices {
        if span.size == 0 {
            return Err(NetworkError::malformed_neuron(index, "zero-size input interval"));
        }
        if span.reach_past >= network.memory_length {
            return Err(NetworkError::ReachBeyondMemory {
                neuron: index,
                reach: span.reach_past,
                memory_length: network.memory_length,
            });
        }
        if is_input_reference(span.start) {
            let deepest = span.start as i64 - (span.size as i64 - 1);
            if -deepest > network.input_size as i64 {
                return Err(NetworkError::malformed_neuron(
                    index,
                    format!(
                        "input-tape reference {deepest} outside the tape of width {}",
                        network.input_size
                    ),
                ));
            }
        } else {
            let last = span.start as i64 + span.size as i64 - 1;
            if last >= network.neurons.len() as i64 {
                return Err(NetworkError::malformed_neuron(
                    index,
                    format!(
                        "input reference {last} outside the neuron array of {}",
                        network.neurons.len()
                    ),
                ));
            }
        }
    }

    for span in &neuron.input_weights {
        if span.size == 0 {
            return Err(NetworkError::malformed_neuron(index, "zero-size weight interval"));
        }
        let last = span.start as i64 + span.size as i64 - 1;
        if span.start < 0 || last >= network.weights.len() as i64 {
            return Err(NetworkError::malformed_neuron(
                index,
                format!(
                    "weight reference {} outside the weight table of {}",
                    if span.start < 0 { span.start as i64 } else { last },
                    network.weights.len()
                ),
            ));
        }
    }
    Ok(())
}
