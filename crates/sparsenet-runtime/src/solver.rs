//! Orchestrates partition solvers across a solution's dependency rows

use parking_lot::Mutex;

use sparsenet_model::{Network, Solution};
use sparsenet_utils::{DataRingbuffer, SharedFrame, ThreadGroup};

use crate::error::{Result, SolveError};
use crate::features::execute_feature_group;
use crate::partial_solver::PartialSolver;

/// Parameters steering solution evaluation.
#[derive(Debug, Clone)]
pub struct SolveConfig {
    /// Number of worker threads the orchestrator fans partitions out to
    pub worker_count: usize,
    /// Ring-buffer depth override; defaults to the solution's memory length.
    /// Training collaborators raise it to retain whole unrolled sequences.
    pub memory_frames: Option<usize>,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism().map_or(4, |count| count.get()),
            memory_frames: None,
        }
    }
}

impl SolveConfig {
    /// Create a validated configuration.
    pub fn new(worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(SolveError::invalid_parameter(
                "worker_count",
                worker_count,
                "> 0",
            ));
        }
        Ok(Self {
            worker_count,
            memory_frames: None,
        })
    }

    /// Retain `frames` steps of activation history instead of the compiled
    /// memory length.
    pub fn with_memory_frames(mut self, frames: usize) -> Self {
        self.memory_frames = Some(frames);
        self
    }
}

/// Evaluates a compiled solution against input samples, step by step.
///
/// Per sample the ring buffer advances once, every dependency row fans its
/// partitions out over the worker pool with a barrier between rows, and the
/// feature groups run over the finished frame. The network output is the
/// trailing `output_neuron_count` slots of that frame.
pub struct SolutionSolver {
    solution: Solution,
    ring: DataRingbuffer,
    solvers: Vec<Vec<Mutex<PartialSolver>>>,
    threads: ThreadGroup,
}

impl SolutionSolver {
    /// Prepare a solver owning `solution`, with scratch state per partition.
    pub fn new(solution: Solution, config: &SolveConfig) -> Result<Self> {
        if solution.rows.is_empty() {
            return Err(SolveError::EmptySolution);
        }
        for (row_index, row) in solution.rows.iter().enumerate() {
            if row.is_empty() {
                return Err(SolveError::EmptyRow { row: row_index });
            }
        }
        let frames = config
            .memory_frames
            .unwrap_or(solution.memory_length as usize)
            .max(solution.memory_length as usize);
        let ring = DataRingbuffer::new(frames, solution.neuron_count as usize);
        let solvers = solution
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|partial| Mutex::new(PartialSolver::new(partial)))
                    .collect()
            })
            .collect();
        Ok(Self {
            solution,
            ring,
            solvers,
            threads: ThreadGroup::new(config.worker_count),
        })
    }

    /// Evaluate one input sample and return the network output: the final
    /// `output_neuron_count` entries of the freshly written frame.
    pub fn solve(&mut self, input: &[f64]) -> Result<&[f64]> {
        if input.len() != self.solution.network_input_size as usize {
            return Err(SolveError::InputSizeMismatch {
                expected: self.solution.network_input_size as usize,
                got: input.len(),
            });
        }

        self.ring.step();
        for (row_index, row) in self.solution.rows.iter().enumerate() {
            let (frame, history) = self.ring.split_current();
            let current = SharedFrame::new(frame);
            let row_solvers = &self.solvers[row_index];
            let worker_count = self.threads.thread_count();
            self.threads.start_and_block(|worker| {
                let mut column = worker;
                while column < row.len() {
                    let partial = &row[column];
                    let mut solver = row_solvers[column].lock();
                    solver.collect_inputs(partial, input, &current, &history);
                    solver.solve(partial, &current);
                    column += worker_count;
                }
            });
            // start_and_block returning is the barrier that makes this row's
            // outputs visible to the next one.
        }

        {
            let (frame, _) = self.ring.split_current();
            let current = SharedFrame::new(frame);
            for group in &self.solution.feature_groups {
                execute_feature_group(group, current, &self.threads);
            }
        }

        Ok(self.output())
    }

    /// Evaluate an input sequence in order, discarding the outputs of the
    /// first `prefill` samples (fed only to warm up recurrent state).
    pub fn solve_sequence(
        &mut self,
        inputs: &[Vec<f64>],
        prefill: usize,
    ) -> Result<Vec<Vec<f64>>> {
        let mut outputs = Vec::with_capacity(inputs.len().saturating_sub(prefill));
        for (sample_index, input) in inputs.iter().enumerate() {
            let output = self.solve(input)?;
            if sample_index >= prefill {
                outputs.push(output.to_vec());
            }
        }
        Ok(outputs)
    }

    /// The output slice of the most recently solved step.
    pub fn output(&self) -> &[f64] {
        let start = (self.solution.neuron_count - self.solution.output_neuron_count) as usize;
        &self.ring.current()[start..]
    }

    /// Activation frame of the `past`-th previous step.
    pub fn neuron_data(&self, past: usize) -> &[f64] {
        self.ring.get(past)
    }

    /// The activation ring buffer.
    pub fn neuron_memory(&self) -> &DataRingbuffer {
        &self.ring
    }

    /// Pre-transfer input sums of the latest solved step, indexed by global
    /// neuron. Training collaborators read these alongside the activations.
    pub fn transfer_function_inputs(&self) -> Vec<f64> {
        self.gather_taps(|solver| solver.transfer_inputs().to_vec())
    }

    /// Post-transfer values of the latest solved step (before spike mixing),
    /// indexed by global neuron.
    pub fn transfer_function_outputs(&self) -> Vec<f64> {
        self.gather_taps(|solver| solver.transfer_outputs().to_vec())
    }

    fn gather_taps(&self, read: impl Fn(&PartialSolver) -> Vec<f64>) -> Vec<f64> {
        let mut values = vec![0.0; self.solution.neuron_count as usize];
        for (row_index, row) in self.solution.rows.iter().enumerate() {
            for (column, partial) in row.iter().enumerate() {
                let solver = self.solvers[row_index][column].lock();
                let taps = read(&solver);
                for (inner, &global) in partial.neuron_indices.iter().enumerate() {
                    values[global as usize] = taps[inner];
                }
            }
        }
        values
    }

    /// Number of values a sample must provide.
    pub fn input_size(&self) -> usize {
        self.solution.network_input_size as usize
    }

    /// Number of values a solved step returns.
    pub fn output_size(&self) -> usize {
        self.solution.output_neuron_count as usize
    }

    /// The solution being evaluated.
    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    /// Refresh the partition-local weight copies from `network`, after an
    /// external trainer mutated its weight table.
    pub fn sync_weights(&mut self, network: &Network) {
        self.solution.sync_weights(network);
    }

    /// Zero the activation memory and every partition's scratch state.
    pub fn reset(&mut self) {
        self.ring.reset();
        for row in &self.solvers {
            for solver in row {
                solver.lock().reset();
            }
        }
    }
}
