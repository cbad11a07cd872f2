//! End-to-end compilation checks over the partition matrix invariants

use sparsenet_compiler::{compile, CompileConfig, CompileError};
use sparsenet_model::{
    InputSynapseInterval, Network, NetworkError, Neuron, RecurrenceKind, Solution,
    SynapseInterval, TransferFunction,
};

/// Fully connected feed-forward network with identity transfers, unit
/// synapse weights, zero biases and zero spike coefficients.
fn layered_identity_network(input_size: u32, layers: &[u32]) -> Network {
    // weight table: [synapse weight, bias, spike coefficient]
    let weights = vec![1.0, 0.0, 0.0];
    let mut neurons = Vec::new();
    let mut previous_layer_start = 0usize;
    for (level, &width) in layers.iter().enumerate() {
        let (start, fan_in) = if level == 0 {
            (-1, input_size)
        } else {
            (previous_layer_start as i32, layers[level - 1])
        };
        previous_layer_start = neurons.len();
        for _ in 0..width {
            let mut weight_spans = vec![SynapseInterval::new(0, 1); fan_in as usize];
            weight_spans.push(SynapseInterval::new(1, 1));
            neurons.push(Neuron {
                transfer_function: TransferFunction::Identity,
                spike_weight_index: 2,
                input_indices: vec![InputSynapseInterval::new(start, fan_in)],
                input_weights: weight_spans,
            });
        }
    }
    let output_neuron_count = *layers.last().unwrap();
    Network {
        input_size,
        output_neuron_count,
        neurons,
        weights,
        recurrence: RecurrenceKind::None,
        memory_length: 1,
        feature_groups: vec![],
    }
}

fn produced_neurons(solution: &Solution) -> Vec<u32> {
    let mut produced = Vec::new();
    for row in &solution.rows {
        for partial in row {
            for span in &partial.output_data {
                for offset in 0..span.size {
                    produced.push(span.start as u32 + offset);
                }
            }
        }
    }
    produced.sort_unstable();
    produced
}

fn workers() -> usize {
    2
}

#[test]
fn a_large_budget_compiles_into_one_partition() {
    let _ = env_logger::builder().is_test(true).try_init();
    let network = layered_identity_network(2, &[3, 2]);
    let config = CompileConfig::new(usize::MAX, workers()).unwrap();
    let solution = compile(&network, &config).unwrap();
    assert_eq!(solution.rows.len(), 1);
    assert_eq!(solution.partition_count(), 1);
    assert_eq!(solution.neuron_count, 5);
    assert_eq!(solution.output_neuron_count, 2);
    solution.validate().unwrap();
}

#[test]
fn every_neuron_is_produced_exactly_once() {
    let network = layered_identity_network(3, &[4, 4, 2]);
    for budget in [usize::MAX, 4096, 512, 256] {
        let config = CompileConfig::new(budget, workers()).unwrap();
        let solution = compile(&network, &config).unwrap();
        let produced = produced_neurons(&solution);
        let expected: Vec<u32> = (0..network.neurons.len() as u32).collect();
        assert_eq!(produced, expected, "budget {budget}");
    }
}

#[test]
fn partitions_of_a_row_have_disjoint_outputs() {
    let network = layered_identity_network(3, &[4, 4, 2]);
    let config = CompileConfig::new(256, workers()).unwrap();
    let solution = compile(&network, &config).unwrap();
    for row in &solution.rows {
        let mut seen = std::collections::HashSet::new();
        for partial in row {
            for span in &partial.output_data {
                for offset in 0..span.size {
                    assert!(
                        seen.insert(span.start as u32 + offset),
                        "neuron produced twice within one row"
                    );
                }
            }
        }
    }
}

#[test]
fn inner_references_always_point_backwards() {
    let network = layered_identity_network(3, &[4, 4, 2]);
    for budget in [usize::MAX, 512] {
        let config = CompileConfig::new(budget, workers()).unwrap();
        let solution = compile(&network, &config).unwrap();
        // validate() enforces the strictly-backward local index invariant
        // per partition.
        solution.validate().unwrap();
    }
}

#[test]
fn a_tight_budget_splits_the_network_into_partitions() {
    let network = layered_identity_network(2, &[3, 2]);
    let whole = compile(&network, &CompileConfig::new(usize::MAX, workers()).unwrap()).unwrap();
    let whole_bytes: usize = whole
        .rows
        .iter()
        .flatten()
        .map(|partial| partial.estimated_bytes())
        .sum();

    let config = CompileConfig::new(whole_bytes / 3, workers()).unwrap();
    let split = compile(&network, &config).unwrap();
    assert!(
        split.partition_count() >= 3,
        "expected at least 3 partitions, got {}",
        split.partition_count()
    );
    assert_eq!(produced_neurons(&split), produced_neurons(&whole));
    split.validate().unwrap();
}

#[test]
fn a_self_recurrent_neuron_compiles() {
    let mut network = layered_identity_network(1, &[1]);
    network.memory_length = 2;
    network.neurons[0]
        .input_indices
        .push(InputSynapseInterval::reaching(0, 1, 1));
    network.neurons[0]
        .input_weights
        .insert(1, SynapseInterval::new(0, 1));
    let solution = compile(&network, &CompileConfig::default()).unwrap();
    assert_eq!(solution.partition_count(), 1);
    assert_eq!(solution.memory_length, 2);
    let partial = &solution.rows[0][0];
    // The previous-step self reference resolves through the gather list.
    assert!(partial
        .input_data
        .iter()
        .any(|span| span.reach_past == 1 && span.start == 0));
}

#[test]
fn mutual_dependency_is_reported_as_a_cycle() {
    let cyclic = |other: i32| Neuron {
        transfer_function: TransferFunction::Identity,
        spike_weight_index: 2,
        input_indices: vec![InputSynapseInterval::new(other, 1)],
        input_weights: vec![SynapseInterval::new(0, 1), SynapseInterval::new(1, 1)],
    };
    let network = Network {
        input_size: 1,
        output_neuron_count: 1,
        neurons: vec![cyclic(1), cyclic(0)],
        weights: vec![1.0, 0.0, 0.0],
        recurrence: RecurrenceKind::None,
        memory_length: 1,
        feature_groups: vec![],
    };
    match compile(&network, &CompileConfig::default()) {
        Err(CompileError::StructuralCycle { unprocessed }) => assert_eq!(unprocessed, 2),
        other => panic!("expected a structural cycle, got {other:?}"),
    }
}

#[test]
fn an_oversized_neuron_exhausts_the_budget() {
    let network = layered_identity_network(2, &[2, 1]);
    let config = CompileConfig::new(16, workers()).unwrap();
    match compile(&network, &config) {
        Err(CompileError::BudgetExhausted { budget: 16, .. }) => {}
        other => panic!("expected budget exhaustion, got {other:?}"),
    }
}

#[test]
fn malformed_networks_are_rejected_up_front() {
    let mut network = layered_identity_network(2, &[2, 1]);
    network.neurons[0].input_weights.clear();
    match compile(&network, &CompileConfig::default()) {
        Err(CompileError::Malformed(NetworkError::MalformedNeuron { neuron: 0, .. })) => {}
        other => panic!("expected a malformed-neuron diagnosis, got {other:?}"),
    }

    let mut network = layered_identity_network(2, &[2, 1]);
    network.neurons[2].input_indices = vec![InputSynapseInterval::reaching(0, 2, 3)];
    assert!(matches!(
        compile(&network, &CompileConfig::default()),
        Err(CompileError::Malformed(NetworkError::ReachBeyondMemory { .. }))
    ));
}

#[test]
fn weight_sync_follows_the_network_table() {
    let mut network = layered_identity_network(1, &[1, 1]);
    let mut solution = compile(&network, &CompileConfig::default()).unwrap();
    network.weights[0] = 2.5;
    solution.sync_weights(&network);
    for row in &solution.rows {
        for partial in row {
            for (slot, &origin) in partial.weight_origins.iter().enumerate() {
                assert_eq!(partial.weight_table[slot], network.weights[origin as usize]);
            }
        }
    }
}
