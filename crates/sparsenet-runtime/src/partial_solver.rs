//! Evaluates one partition against the activation ring buffer
//!
//! Solving a partition is a gather, a strictly sequential sweep over its
//! inner neurons, and a scatter. The partition's local-coordinate invariant
//! guarantees every internal reference points at an already-computed inner
//! neuron, so the sweep resolves all dependencies in declaration order.

use sparsenet_model::{
    input_slot, is_input_reference, spike_value, PartialSolution, SynapseIterator,
};
use sparsenet_utils::{RingHistory, SharedFrame};

/// Scratch state for solving one partition.
///
/// The buffers persist across steps so a solve allocates nothing; the
/// pre-transfer sums and post-transfer values of the latest step stay
/// readable for training collaborators.
#[derive(Debug)]
pub struct PartialSolver {
    collected_inputs: Vec<f64>,
    neuron_output: Vec<f64>,
    transfer_input: Vec<f64>,
    transfer_output: Vec<f64>,
}

impl PartialSolver {
    /// Size the scratch buffers for `partial`.
    pub fn new(partial: &PartialSolution) -> Self {
        let inner = partial.inner_neuron_count as usize;
        Self {
            collected_inputs: vec![0.0; partial.input_size() as usize],
            neuron_output: vec![0.0; inner],
            transfer_input: vec![0.0; inner],
            transfer_output: vec![0.0; inner],
        }
    }

    /// Number of values the partition gathers before solving.
    pub fn input_size(&self) -> usize {
        self.collected_inputs.len()
    }

    /// Resolve the partition's gather list into the input scratch.
    ///
    /// Negative synapse indices read the input tape; non-negative indices
    /// read the ring buffer: the frame being written for current-step
    /// prerequisites (produced by earlier rows), a history frame for
    /// reach-back references.
    pub fn collect_inputs(
        &mut self,
        partial: &PartialSolution,
        tape: &[f64],
        current: &SharedFrame<'_>,
        history: &RingHistory<'_>,
    ) {
        let mut position = 0usize;
        let collected = &mut self.collected_inputs;
        SynapseIterator::new(&partial.input_data).iterate_pairs(|span, input_index| {
            collected[position] = if is_input_reference(input_index) {
                tape[input_slot(input_index)]
            } else if span.reach_past == 0 {
                // Produced by an earlier row of this step; stable by now.
                unsafe { current.get(input_index as usize) }
            } else {
                history.past(span.reach_past as usize)[input_index as usize]
            };
            position += 1;
        });
    }

    /// Evaluate every inner neuron and scatter the results into the frame
    /// being written.
    ///
    /// The spike mix reads each neuron's previous activation from its own
    /// slot of that frame before overwriting it: stepping the ring leaves
    /// the previous step's value there, for a single-frame buffer trivially
    /// so.
    pub fn solve(&mut self, partial: &PartialSolution, current: &SharedFrame<'_>) {
        let mut span_cursor = 0usize;
        let mut weight_cursor = 0usize;
        for neuron in 0..partial.inner_neuron_count as usize {
            let span_count = partial.index_synapse_counts[neuron] as usize;
            let spans = &partial.inside_indices[span_cursor..span_cursor + span_count];
            span_cursor += span_count;

            let mut sum = 0.0;
            {
                let collected = &self.collected_inputs;
                let produced = &self.neuron_output;
                SynapseIterator::new(spans).iterate(|local_index| {
                    let value = if local_index < 0 {
                        collected[input_slot(local_index)]
                    } else {
                        produced[local_index as usize]
                    };
                    sum += value * partial.weight_table[weight_cursor];
                    weight_cursor += 1;
                });
            }
            let bias_start = partial.bias_indices[neuron] as usize;
            let spike_slot = partial.spike_indices[neuron] as usize;
            for &bias in &partial.weight_table[bias_start..spike_slot] {
                sum += bias;
            }

            self.transfer_input[neuron] = sum;
            let transferred = partial.transfer_functions[neuron].apply(sum);
            self.transfer_output[neuron] = transferred;

            let global = partial.neuron_indices[neuron] as usize;
            let previous = unsafe { current.get(global) };
            self.neuron_output[neuron] =
                spike_value(partial.weight_table[spike_slot], transferred, previous);
            weight_cursor = spike_slot + 1;
        }

        let mut inner = 0usize;
        let produced = &self.neuron_output;
        SynapseIterator::new(&partial.output_data).iterate(|global_index| {
            // This partition is the only writer of its output slots.
            unsafe { current.set(global_index as usize, produced[inner]) };
            inner += 1;
        });
    }

    /// Zero all scratch state.
    pub fn reset(&mut self) {
        self.collected_inputs.fill(0.0);
        self.neuron_output.fill(0.0);
        self.transfer_input.fill(0.0);
        self.transfer_output.fill(0.0);
    }

    /// Pre-transfer input sums of the latest solved step, per inner neuron.
    pub fn transfer_inputs(&self) -> &[f64] {
        &self.transfer_input
    }

    /// Post-transfer values of the latest solved step, per inner neuron.
    pub fn transfer_outputs(&self) -> &[f64] {
        &self.transfer_output
    }
}
