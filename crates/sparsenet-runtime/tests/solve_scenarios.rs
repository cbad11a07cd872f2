//! End-to-end evaluation scenarios against compiled solutions

use sparsenet_compiler::{compile, CompileConfig};
use sparsenet_model::{
    FeatureGroup, FeatureKind, InputSynapseInterval, Network, Neuron, RecurrenceKind,
    SynapseInterval, TransferFunction,
};
use sparsenet_runtime::{SolutionSolver, SolveConfig, SolveError};

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

fn solver_for(network: &Network) -> SolutionSolver {
    let solution = compile(network, &CompileConfig::default()).unwrap();
    SolutionSolver::new(solution, &SolveConfig::new(2).unwrap()).unwrap()
}

#[test]
fn two_neuron_identity_chain_passes_its_input_through() {
    let _ = env_logger::builder().is_test(true).try_init();
    let network = layered_identity_network(1, &[1, 1]);
    let mut solver = solver_for(&network);
    assert_eq!(solver.solve(&[3.0]).unwrap(), &[3.0]);
}

#[test]
fn fully_connected_2_3_2_sums_its_layers() {
    let network = layered_identity_network(2, &[3, 2]);
    let mut solver = solver_for(&network);
    let output = solver.solve(&[1.0, 2.0]).unwrap().to_vec();
    assert_eq!(output, vec![9.0, 9.0]);
    // Hidden layer holds the plain input sum.
    assert_eq!(&solver.neuron_data(0)[..3], &[3.0, 3.0, 3.0]);
}

#[test]
fn budget_splitting_does_not_change_the_result() {
    let network = layered_identity_network(2, &[3, 2]);
    let whole = compile(&network, &CompileConfig::default()).unwrap();
    let whole_bytes: usize = whole
        .rows
        .iter()
        .flatten()
        .map(|partial| partial.estimated_bytes())
        .sum();
    let mut reference =
        SolutionSolver::new(whole, &SolveConfig::new(2).unwrap()).unwrap();
    let expected = reference.solve(&[1.0, 2.0]).unwrap().to_vec();

    let split = compile(
        &network,
        &CompileConfig::new(whole_bytes / 3, 2).unwrap(),
    )
    .unwrap();
    assert!(split.partition_count() >= 3);
    let mut solver = SolutionSolver::new(split, &SolveConfig::new(2).unwrap()).unwrap();
    let output = solver.solve(&[1.0, 2.0]).unwrap();
    for (value, reference_value) in output.iter().zip(&expected) {
        assert!((value - reference_value).abs() < 1e-14);
    }
}

/// One neuron fed from the tape, holding on to its previous activation
/// through the spike coefficient.
fn spiking_single_neuron(spike: f64) -> Network {
    Network {
        input_size: 1,
        output_neuron_count: 1,
        neurons: vec![Neuron {
            transfer_function: TransferFunction::Identity,
            spike_weight_index: 2,
            input_indices: vec![InputSynapseInterval::new(-1, 1)],
            input_weights: vec![SynapseInterval::new(0, 1), SynapseInterval::new(1, 1)],
        }],
        weights: vec![1.0, 0.0, spike],
        recurrence: RecurrenceKind::ToSelf,
        memory_length: 2,
        feature_groups: vec![],
    }
}

#[test]
fn spike_memory_decays_towards_the_input() {
    let network = spiking_single_neuron(0.5);
    let mut solver = solver_for(&network);
    let mut outputs = Vec::new();
    for _ in 0..3 {
        outputs.push(solver.solve(&[1.0]).unwrap()[0]);
    }
    for (computed, expected) in outputs.iter().zip([0.5, 0.75, 0.875]) {
        assert!((computed - expected).abs() < 1e-12);
    }
}

#[test]
fn a_strong_spike_coefficient_keeps_fading_history() {
    let network = spiking_single_neuron(0.9);
    let mut solver = solver_for(&network);
    let mut outputs = Vec::new();
    for input in [10.0, 0.0, 0.0] {
        outputs.push(solver.solve(&[input]).unwrap()[0]);
    }
    for (computed, expected) in outputs.iter().zip([1.0, 0.9, 0.81]) {
        assert!((computed - expected).abs() < 1e-12);
    }
}

#[test]
fn an_explicit_past_reference_reads_the_previous_step() {
    // out_t = in_t + 0.5 * out_{t-1}, spike disabled: the self synapse goes
    // through the ring-buffer history instead of the memory filter.
    let network = Network {
        input_size: 1,
        output_neuron_count: 1,
        neurons: vec![Neuron {
            transfer_function: TransferFunction::Identity,
            spike_weight_index: 3,
            input_indices: vec![
                InputSynapseInterval::new(-1, 1),
                InputSynapseInterval::reaching(0, 1, 1),
            ],
            input_weights: vec![
                SynapseInterval::new(0, 1),
                SynapseInterval::new(1, 1),
                SynapseInterval::new(2, 1),
            ],
        }],
        weights: vec![1.0, 0.5, 0.0, 0.0],
        recurrence: RecurrenceKind::ToSelf,
        memory_length: 2,
        feature_groups: vec![],
    };
    let mut solver = solver_for(&network);
    let mut outputs = Vec::new();
    for input in [1.0, 0.0, 0.0] {
        outputs.push(solver.solve(&[input]).unwrap()[0]);
    }
    for (computed, expected) in outputs.iter().zip([1.0, 0.5, 0.25]) {
        assert!((computed - expected).abs() < 1e-12);
    }
}

/// Four bias-only neurons producing 1..4, with a softmax group over all of
/// them.
fn softmax_network() -> Network {
    let neurons = (0..4)
        .map(|index| Neuron {
            transfer_function: TransferFunction::Identity,
            spike_weight_index: 0,
            input_indices: vec![],
            input_weights: vec![SynapseInterval::new(index + 1, 1)],
        })
        .collect();
    Network {
        input_size: 0,
        output_neuron_count: 4,
        neurons,
        weights: vec![0.0, 1.0, 2.0, 3.0, 4.0],
        recurrence: RecurrenceKind::None,
        memory_length: 1,
        feature_groups: vec![FeatureGroup {
            kind: FeatureKind::Softmax,
            relevant_neurons: vec![SynapseInterval::new(0, 4)],
        }],
    }
}

#[test]
fn softmax_feature_group_normalizes_the_output_layer() {
    let network = softmax_network();
    let mut solver = solver_for(&network);
    let output = solver.solve(&[]).unwrap().to_vec();

    let sum: f64 = output.iter().sum();
    assert!((sum - 1.0).abs() < 1e-12);

    // Standard softmax over [1, 2, 3, 4].
    let raw = [1.0f64, 2.0, 3.0, 4.0];
    let expsum: f64 = raw.iter().map(|value| value.exp()).sum();
    for (computed, &value) in output.iter().zip(&raw) {
        assert!((computed - value.exp() / expsum).abs() < 1e-12);
    }
    let argmax = output
        .iter()
        .enumerate()
        .max_by(|left, right| left.1.total_cmp(right.1))
        .unwrap()
        .0;
    assert_eq!(argmax, 3);
}

#[test]
fn reset_makes_evaluation_repeatable() {
    let network = spiking_single_neuron(0.9);
    let mut solver = solver_for(&network);
    let first: Vec<f64> = (0..3).map(|_| solver.solve(&[1.0]).unwrap()[0]).collect();
    solver.reset();
    let second: Vec<f64> = (0..3).map(|_| solver.solve(&[1.0]).unwrap()[0]).collect();
    assert_eq!(first, second);
}

#[test]
fn non_recurrent_solves_are_stateless() {
    let network = layered_identity_network(2, &[3, 2]);
    let mut solver = solver_for(&network);
    let first = solver.solve(&[1.0, 2.0]).unwrap().to_vec();
    for _ in 0..5 {
        assert_eq!(solver.solve(&[1.0, 2.0]).unwrap(), first.as_slice());
    }
}

#[test]
fn synced_weights_flow_into_the_next_solve() {
    let mut network = layered_identity_network(1, &[1, 1]);
    let mut solver = solver_for(&network);
    assert_eq!(solver.solve(&[2.0]).unwrap(), &[2.0]);

    network.weights[0] = 3.0;
    solver.sync_weights(&network);
    assert_eq!(solver.solve(&[2.0]).unwrap(), &[18.0]);
}

#[test]
fn sequences_discard_prefill_outputs() {
    let network = spiking_single_neuron(0.5);
    let solution = compile(&network, &CompileConfig::default()).unwrap();
    let config = SolveConfig::new(2).unwrap().with_memory_frames(4);
    let mut solver = SolutionSolver::new(solution, &config).unwrap();

    let inputs = vec![vec![1.0], vec![1.0], vec![1.0], vec![1.0]];
    let outputs = solver.solve_sequence(&inputs, 2).unwrap();
    assert_eq!(outputs.len(), 2);
    assert!((outputs[0][0] - 0.875).abs() < 1e-12);
    assert!((outputs[1][0] - 0.9375).abs() < 1e-12);

    // With four frames retained, the whole sequence stays readable.
    assert!((solver.neuron_data(1)[0] - 0.875).abs() < 1e-12);
    assert!((solver.neuron_data(3)[0] - 0.5).abs() < 1e-12);
}

#[test]
fn mismatched_input_width_is_reported() {
    let network = layered_identity_network(2, &[2, 1]);
    let mut solver = solver_for(&network);
    assert!(matches!(
        solver.solve(&[1.0]),
        Err(SolveError::InputSizeMismatch {
            expected: 2,
            got: 1
        })
    ));
}

/// Layered network with per-synapse weights, nonzero biases, spike memory
/// and a mix of transfer functions, for comparison against a direct
/// evaluation of the network record.
fn rich_layered_network(input_size: u32, layers: &[u32]) -> Network {
    let transfers = [
        TransferFunction::Identity,
        TransferFunction::Sigmoid,
        TransferFunction::Tanh,
        TransferFunction::Relu,
        TransferFunction::Selu,
    ];
    let mut weights = Vec::new();
    let mut neurons: Vec<Neuron> = Vec::new();
    let mut previous_layer_start = 0usize;
    let mut next_weight = 0.05f64;
    for (level, &width) in layers.iter().enumerate() {
        let (start, fan_in) = if level == 0 {
            (-1, input_size)
        } else {
            (previous_layer_start as i32, layers[level - 1])
        };
        previous_layer_start = neurons.len();
        for lane in 0..width {
            let weight_start = weights.len() as i32;
            for _ in 0..fan_in {
                weights.push(next_weight);
                next_weight = (next_weight + 0.17) % 0.9 - 0.3;
            }
            weights.push(0.1 * (lane as f64 + 1.0)); // bias
            let spike_weight_index = weights.len() as u32;
            weights.push(0.3); // spike coefficient
            neurons.push(Neuron {
                transfer_function: transfers[neurons.len() % transfers.len()],
                spike_weight_index,
                input_indices: vec![InputSynapseInterval::new(start, fan_in)],
                input_weights: vec![SynapseInterval::new(weight_start, fan_in + 1)],
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

/// Evaluate one step straight off the network record, neuron by neuron in
/// declaration order. `state` carries the previous step's activations.
fn reference_step(network: &Network, input: &[f64], state: &mut [f64]) -> Vec<f64> {
    let mut current = state.to_vec();
    for (index, neuron) in network.neurons.iter().enumerate() {
        let mut flat_weights = Vec::new();
        for span in &neuron.input_weights {
            for offset in 0..span.size {
                flat_weights.push(network.weights[(span.start + offset as i32) as usize]);
            }
        }
        let mut sum = 0.0;
        let mut weight_slot = 0usize;
        for span in &neuron.input_indices {
            for offset in 0..span.size {
                let reference = if span.start < 0 {
                    span.start - offset as i32
                } else {
                    span.start + offset as i32
                };
                let value = if reference < 0 {
                    input[(-reference - 1) as usize]
                } else {
                    current[reference as usize]
                };
                sum += value * flat_weights[weight_slot];
                weight_slot += 1;
            }
        }
        for &bias in &flat_weights[weight_slot..] {
            sum += bias;
        }
        let transferred = neuron.transfer_function.apply(sum);
        let spike = network.weights[neuron.spike_weight_index as usize];
        current[index] = spike * state[index] + (1.0 - spike) * transferred;
    }
    state.copy_from_slice(&current);
    current[network.first_output_index()..].to_vec()
}

#[test]
fn compiled_evaluation_matches_the_direct_one() {
    let network = rich_layered_network(2, &[4, 3]);
    let samples = [vec![0.4, -1.2], vec![1.0, 0.3], vec![-0.7, 2.1]];

    for budget in [usize::MAX, 400] {
        let solution = compile(
            &network,
            &CompileConfig::new(budget, 2).unwrap(),
        )
        .unwrap();
        let mut solver =
            SolutionSolver::new(solution, &SolveConfig::new(2).unwrap()).unwrap();

        let mut reference_state = vec![0.0; network.neurons.len()];
        for sample in &samples {
            let expected = reference_step(&network, sample, &mut reference_state);
            let computed = solver.solve(sample).unwrap();
            for (computed_value, expected_value) in computed.iter().zip(&expected) {
                assert!(
                    (computed_value - expected_value).abs() < 1e-12,
                    "budget {budget}: {computed_value} vs {expected_value}"
                );
            }
        }
    }
}

#[test]
fn gradient_taps_cover_every_neuron() {
    let network = layered_identity_network(2, &[3, 2]);
    let mut solver = solver_for(&network);
    solver.solve(&[1.0, 2.0]).unwrap();
    // Identity transfers: the taps hold the raw layer sums.
    assert_eq!(
        solver.transfer_function_inputs(),
        vec![3.0, 3.0, 3.0, 9.0, 9.0]
    );
    assert_eq!(
        solver.transfer_function_outputs(),
        vec![3.0, 3.0, 3.0, 9.0, 9.0]
    );
}

#[test]
fn output_helpers_report_the_compiled_shape() {
    let network = layered_identity_network(2, &[3, 2]);
    let solver = solver_for(&network);
    assert_eq!(solver.input_size(), 2);
    assert_eq!(solver.output_size(), 2);
    assert_eq!(solver.solution().neuron_count, 5);
}
