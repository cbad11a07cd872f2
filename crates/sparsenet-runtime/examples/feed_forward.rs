//! Compile and evaluate a small fully connected network
//!
//! Builds a 2-3-2 identity network by hand, compiles it once with a generous
//! device budget and once with a deliberately tiny one, and shows that the
//! partitioned plan produces the same outputs as the single-partition plan.

use sparsenet_compiler::{compile, CompileConfig};
use sparsenet_model::{
    InputSynapseInterval, Network, Neuron, RecurrenceKind, SynapseInterval, TransferFunction,
};
use sparsenet_runtime::{SolutionSolver, SolveConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let network = build_network();

    println!("🧠 sparsenet feed-forward demo");
    println!("==============================\n");

    let whole = compile(&network, &CompileConfig::default())?;
    println!(
        "generous budget: {} partition(s) over {} row(s)",
        whole.partition_count(),
        whole.rows.len()
    );
    let whole_bytes: usize = whole
        .rows
        .iter()
        .flatten()
        .map(|partial| partial.estimated_bytes())
        .sum();

    let mut solver = SolutionSolver::new(whole, &SolveConfig::new(2)?)?;
    let output = solver.solve(&[1.0, 2.0])?.to_vec();
    println!("output for [1, 2]: {output:?}");

    let split = compile(&network, &CompileConfig::new(whole_bytes / 3, 2)?)?;
    println!(
        "\ntight budget ({} bytes): {} partition(s) over {} row(s)",
        whole_bytes / 3,
        split.partition_count(),
        split.rows.len()
    );
    let mut split_solver = SolutionSolver::new(split, &SolveConfig::new(2)?)?;
    let split_output = split_solver.solve(&[1.0, 2.0])?.to_vec();
    println!("output for [1, 2]: {split_output:?}");

    assert_eq!(output, split_output);
    println!("\n✅ partitioned evaluation matches the single-partition plan");
    Ok(())
}

/// Fully connected 2-3-2 with identity transfers, unit weights, zero biases
/// and no spike memory.
fn build_network() -> Network {
    let mut neurons = Vec::new();
    for _ in 0..3 {
        neurons.push(layer_neuron(-1, 2));
    }
    for _ in 0..2 {
        neurons.push(layer_neuron(0, 3));
    }
    Network {
        input_size: 2,
        output_neuron_count: 2,
        neurons,
        weights: vec![1.0, 0.0, 0.0],
        recurrence: RecurrenceKind::None,
        memory_length: 1,
        feature_groups: vec![],
    }
}

fn layer_neuron(start: i32, fan_in: u32) -> Neuron {
    let mut weight_spans = vec![SynapseInterval::new(0, 1); fan_in as usize];
    weight_spans.push(SynapseInterval::new(1, 1));
    Neuron {
        transfer_function: TransferFunction::Identity,
        spike_weight_index: 2,
        input_indices: vec![InputSynapseInterval::new(start, fan_in)],
        input_weights: weight_spans,
    }
}
