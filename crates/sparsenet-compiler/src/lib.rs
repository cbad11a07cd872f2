//! Compiles sparse networks into memory-bounded partition matrices
//!
//! The compiler turns a declarative network into an ordered collection of
//! independently solvable partitions: the router repeatedly selects subsets
//! of neurons whose dependencies are satisfied, and the builder packs them
//! into partial solutions whose measured size respects the device budget.
//! Partitions land in a row/column matrix (rows are sequential dependency
//! stages, columns within a row are independent of each other), which is
//! exactly the shape the runtime's orchestrator consumes.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod partial_builder;
pub mod router;

pub use error::{CompileError, Result};
pub use partial_builder::PartialBuilder;
pub use router::NeuronRouter;

use sparsenet_model::{
    neuron_estimated_bytes, validate_network, Network, PartialSolution, Solution,
};

/// Parameters steering a compilation run.
#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Device memory budget one partition may occupy, in bytes
    pub budget_bytes: usize,
    /// Number of collector threads the router runs with
    pub worker_count: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 2 * 1024 * 1024 * 1024,
            worker_count: std::thread::available_parallelism().map_or(4, |count| count.get()),
        }
    }
}

impl CompileConfig {
    /// Create a validated configuration.
    pub fn new(budget_bytes: usize, worker_count: usize) -> Result<Self> {
        if budget_bytes == 0 {
            return Err(CompileError::invalid_parameter(
                "budget_bytes",
                budget_bytes,
                "> 0",
            ));
        }
        if worker_count == 0 {
            return Err(CompileError::invalid_parameter(
                "worker_count",
                worker_count,
                "> 0",
            ));
        }
        Ok(Self {
            budget_bytes,
            worker_count,
        })
    }

    /// Override the device budget.
    pub fn with_budget_bytes(mut self, budget_bytes: usize) -> Self {
        self.budget_bytes = budget_bytes;
        self
    }

    /// Override the collector thread count.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }
}

/// Compile `network` into a solution honoring the device budget.
///
/// The network is validated up front; compilation then alternates between
/// router collection passes and partition packing until the whole output
/// layer is processed. A collection pass that yields nothing while a row is
/// still empty means the remaining neurons depend on each other in a cycle,
/// which is reported instead of looping.
pub fn compile(network: &Network, config: &CompileConfig) -> Result<Solution> {
    validate_network(network)?;
    for (index, neuron) in network.neurons.iter().enumerate() {
        let estimated = neuron_estimated_bytes(neuron);
        if estimated > config.budget_bytes {
            return Err(CompileError::BudgetExhausted {
                neuron: index,
                estimated,
                budget: config.budget_bytes,
            });
        }
    }

    let mut router = NeuronRouter::new(network);
    let mut rows: Vec<Vec<PartialSolution>> = vec![Vec::new()];
    let mut builder = PartialBuilder::new(network);
    let mut row_neurons: Vec<u32> = Vec::new();
    let mut placed_in_row = 0usize;
    let mut strict = false;

    while !router.finished() {
        router.collect_subset(config.worker_count, config.budget_bytes, strict);

        let mut placed_this_pass = 0usize;
        let mut split = false;
        while placed_in_row < router.subset_size() {
            let neuron_index = router
                .subset_element(placed_in_row)
                .expect("queued position checked against the subset size");
            builder.add_neuron(neuron_index);
            row_neurons.push(neuron_index);
            placed_in_row += 1;
            placed_this_pass += 1;

            if builder.partial().estimated_bytes() > config.budget_bytes {
                // The partition crossed the budget: close it and open a
                // fresh column in the same row. Strict mode keeps the new
                // partition from depending on still-reserved row members.
                let partial = std::mem::replace(&mut builder, PartialBuilder::new(network));
                rows.last_mut()
                    .expect("the row list is never empty")
                    .push(partial.finish());
                router.reset_remaining(placed_in_row);
                router.set_collected_bytes(0);
                strict = true;
                split = true;
                break;
            }
        }
        if split || placed_this_pass > 0 {
            continue;
        }

        // No new candidates: the current row is exhausted.
        let partial = std::mem::replace(&mut builder, PartialBuilder::new(network)).finish();
        if partial.inner_neuron_count > 0 {
            debug_assert!(partial.validate().is_ok());
            rows.last_mut()
                .expect("the row list is never empty")
                .push(partial);
        }
        if row_neurons.is_empty() {
            if router.finished() {
                break;
            }
            let unprocessed = (0..network.neuron_count() as u32)
                .filter(|&index| !router.is_processed(index))
                .count();
            return Err(CompileError::StructuralCycle { unprocessed });
        }
        for &neuron_index in &row_neurons {
            let confirmed = router.confirm_processed(neuron_index);
            debug_assert!(confirmed, "row neurons drain in placement order");
        }
        row_neurons.clear();
        placed_in_row = 0;
        router.set_collected_bytes(0);
        strict = false;
        if !rows.last().expect("the row list is never empty").is_empty() {
            rows.push(Vec::new());
        }
    }

    while rows.last().is_some_and(|row| row.is_empty()) {
        rows.pop();
    }

    let solution = Solution {
        network_input_size: network.input_size,
        neuron_count: network.neuron_count() as u32,
        output_neuron_count: network.output_neuron_count,
        memory_length: network.memory_length,
        feature_groups: network.feature_groups.clone(),
        rows,
    };
    log::info!(
        "compiled {} neurons into {} partitions over {} rows",
        solution.neuron_count,
        solution.partition_count(),
        solution.rows.len()
    );
    Ok(solution)
}
