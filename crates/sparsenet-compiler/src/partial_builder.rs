//! Builds partial solutions by rewriting neurons into local coordinates
//!
//! Adding a neuron walks its synapse inputs in order. References the
//! partition can serve internally become non-negative local indices pointing
//! at earlier inner neurons; everything else goes through the partition's
//! gather list and becomes a negative local index. Contiguous additions are
//! merged into the open interval so both the gather list and the local input
//! lists stay compact.

use sparsenet_model::{
    input_reference, is_input_reference, InputSynapseInterval, Network, PartialSolution,
    SynapseInterval, SynapseIterator, SynapseSpan,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputSource {
    None,
    Internal,
    External,
}

/// Front-end creating one partial solution by appending neurons to it.
pub struct PartialBuilder<'a> {
    net: &'a Network,
    partial: PartialSolution,
    previous_source: InputSource,
    previous_local: i32,
}

impl<'a> PartialBuilder<'a> {
    /// Start an empty partition over `net`.
    pub fn new(net: &'a Network) -> Self {
        Self {
            net,
            partial: PartialSolution::new(),
            previous_source: InputSource::None,
            previous_local: 0,
        }
    }

    /// The partition built so far.
    pub fn partial(&self) -> &PartialSolution {
        &self.partial
    }

    /// Close the builder and hand out the finished partition.
    pub fn finish(self) -> PartialSolution {
        self.partial
    }

    /// Append the neuron at `neuron_index`, rewriting its inputs into the
    /// partition's local coordinate system and extending the scatter list.
    ///
    /// Returns the deepest reach-back among the neuron's inputs.
    pub fn add_neuron(&mut self, neuron_index: u32) -> u32 {
        let neuron = &self.net.neurons[neuron_index as usize];
        let inner_position = self.partial.inner_neuron_count;
        self.partial.neuron_indices.push(neuron_index);

        // Each neuron starts a fresh local interval; intervals never straddle
        // two neurons' input lists.
        self.previous_source = InputSource::None;
        let spans_before = self.partial.inside_indices.len();
        let mut max_reach = 0u32;

        SynapseIterator::new(&neuron.input_indices).iterate_pairs(|span, input_index| {
            let reach = span.reach_past();
            max_reach = max_reach.max(reach);
            let (local, source) = if is_input_reference(input_index) {
                (self.gather_slot(input_index, reach), InputSource::External)
            } else if reach == 0 {
                match self.inner_position_of(input_index as u32, inner_position) {
                    Some(inner) => (inner as i32, InputSource::Internal),
                    None => (self.gather_slot(input_index, reach), InputSource::External),
                }
            } else {
                // Data from a previous step always goes through the gather
                // list, even when this partition owns the producer.
                (self.gather_slot(input_index, reach), InputSource::External)
            };
            self.push_inside_index(local, source);
        });
        self.partial
            .index_synapse_counts
            .push((self.partial.inside_indices.len() - spans_before) as u32);

        // Local weight layout per neuron: inputs, then biases, then spike.
        let weight_iter = SynapseIterator::new(&neuron.input_weights);
        let input_count = neuron.input_count();
        let weight_base = self.partial.weight_table.len();
        weight_iter.iterate(|weight_index| {
            self.partial
                .weight_table
                .push(self.net.weights[weight_index as usize]);
            self.partial.weight_origins.push(weight_index as u32);
        });
        self.partial.weight_counts.push(input_count);
        self.partial
            .bias_indices
            .push((weight_base + input_count as usize) as u32);
        self.partial
            .weight_table
            .push(self.net.weights[neuron.spike_weight_index as usize]);
        self.partial.weight_origins.push(neuron.spike_weight_index);
        self.partial
            .spike_indices
            .push((self.partial.weight_table.len() - 1) as u32);

        self.partial.transfer_functions.push(neuron.transfer_function);
        self.add_output(neuron_index);
        self.partial.inner_neuron_count += 1;
        max_reach
    }

    /// Position of `neuron_index` among the inner neurons added so far.
    fn inner_position_of(&self, neuron_index: u32, inner_count: u32) -> Option<u32> {
        self.partial.neuron_indices[..inner_count as usize]
            .iter()
            .position(|&inner| inner == neuron_index)
            .map(|position| position as u32)
    }

    /// Local negative index resolving `input_index` at `reach` through the
    /// gather list, locating an existing slot or appending one.
    fn gather_slot(&mut self, input_index: i32, reach: u32) -> i32 {
        let mut slot_base = 0u32;
        for span in &self.partial.input_data {
            if span.reach_past == reach {
                let offset = if span.start < 0 {
                    span.start as i64 - input_index as i64
                } else {
                    input_index as i64 - span.start as i64
                };
                if (0..span.size as i64).contains(&offset) {
                    return input_reference((slot_base as i64 + offset) as usize);
                }
            }
            slot_base += span.size;
        }

        let appended_slot = slot_base as usize;
        if let Some(last) = self.partial.input_data.last_mut() {
            let continuation = if last.start < 0 {
                last.start as i64 - last.size as i64
            } else {
                last.start as i64 + last.size as i64
            };
            if last.reach_past == reach && continuation == input_index as i64 {
                last.size += 1;
                return input_reference(appended_slot);
            }
        }
        self.partial
            .input_data
            .push(InputSynapseInterval::reaching(input_index, 1, reach));
        input_reference(appended_slot)
    }

    /// Append a local index to the current neuron's input list, extending
    /// the open interval when the index continues it.
    fn push_inside_index(&mut self, local: i32, source: InputSource) {
        let continues = source == self.previous_source
            && match self.partial.inside_indices.last() {
                Some(_) if self.previous_local < 0 => local == self.previous_local - 1,
                Some(_) => local == self.previous_local + 1,
                None => false,
            };
        if continues {
            self.partial
                .inside_indices
                .last_mut()
                .expect("continuation implies an open interval")
                .size += 1;
        } else {
            self.partial
                .inside_indices
                .push(SynapseInterval::new(local, 1));
        }
        self.previous_local = local;
        self.previous_source = source;
    }

    /// Record the neuron in the scatter list, merging into the last interval
    /// when its global index is the direct continuation.
    fn add_output(&mut self, neuron_index: u32) {
        if let Some(last) = self.partial.output_data.last_mut() {
            if last.start as i64 + last.size as i64 == neuron_index as i64 {
                last.size += 1;
                return;
            }
        }
        self.partial
            .output_data
            .push(SynapseInterval::new(neuron_index as i32, 1));
    }
}
