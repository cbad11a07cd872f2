//! Concurrent dependency resolver selecting solvable neuron subsets
//!
//! The router iterates a network and collects subsets of neurons all of whom
//! can be solved without waiting on each other. Neurons at the front of the
//! net only consume input-tape data, so they are ready immediately; every
//! later subset builds on what previous iterations marked processed. The
//! partition builder turns the collected subsets into partial solutions.
//!
//! Per neuron a single atomic counter encodes the whole progress state over
//! the neuron's fan-in count `F`:
//!
//! - `0 ..= F-1`: in progress, value counts the satisfied inputs
//! - `F`: solvable, every input is accounted for
//! - `F+1`: reserved, claimed for the subset being collected
//! - `F+2`: processed, finalized
//! - `F+2+k`: deferred, to be revisited at iteration `k` or later

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use parking_lot::Mutex;

use sparsenet_model::{is_input_reference, neuron_estimated_bytes, Network, SynapseIterator};

/// Collects maximal independent subsets of solvable neurons from a network.
///
/// All state transitions go through compare-and-swap on the per-neuron
/// counters, so any number of collector threads can traverse the net at
/// once. The shared subset itself sits behind a mutex; the byte accumulator
/// tracking the estimated footprint of the collected neurons is atomic.
pub struct NeuronRouter<'a> {
    net: &'a Network,
    neuron_states: Vec<AtomicU32>,
    neuron_input_counts: Vec<u32>,
    /// Lowest output-layer neuron not yet processed; advances monotonically.
    output_layer_cursor: AtomicU32,
    subset: Mutex<VecDeque<u32>>,
    collected_bytes: AtomicUsize,
    // Starts at 1 so deferred sentinels stay distinct from `processed`.
    iteration: u16,
    collection_running: bool,
}

impl<'a> NeuronRouter<'a> {
    /// Prepare a router over `net`, with every neuron unvisited.
    pub fn new(net: &'a Network) -> Self {
        let neuron_input_counts: Vec<u32> =
            net.neurons.iter().map(|neuron| neuron.input_count()).collect();
        let neuron_states = net.neurons.iter().map(|_| AtomicU32::new(0)).collect();
        Self {
            net,
            neuron_states,
            neuron_input_counts,
            output_layer_cursor: AtomicU32::new(net.first_output_index() as u32),
            subset: Mutex::new(VecDeque::new()),
            collected_bytes: AtomicUsize::new(0),
            iteration: 1,
            collection_running: false,
        }
    }

    /// Whether the whole output layer has been processed.
    pub fn finished(&self) -> bool {
        let last = self.net.neuron_count() as u32 - 1;
        self.output_layer_cursor.load(Ordering::Acquire) == last && self.is_processed(last)
    }

    /// Collect solvable neurons into the shared subset.
    ///
    /// `worker_count` collector threads traverse the net from spread-out
    /// output neurons until the output layer is exhausted or the estimated
    /// subset footprint passes `budget_bytes`. In strict mode a reserved but
    /// unprocessed prerequisite does not satisfy a dependency; outside of it
    /// it does, which lets a subset grow across what strict mode would split
    /// into separate passes.
    pub fn collect_subset(&mut self, worker_count: usize, budget_bytes: usize, strict: bool) {
        let worker_count = worker_count.max(1);
        self.collection_running = true;
        let router = &*self;
        crossbeam::thread::scope(|scope| {
            for thread_index in 0..worker_count {
                scope.spawn(move |_| {
                    router.collect_thread(worker_count, budget_bytes, thread_index, strict);
                });
            }
        })
        .expect("router collector thread panicked");
        self.collection_running = false;
        self.iteration += 1;
        log::debug!(
            "router iteration {}: subset of {} neurons (~{} bytes)",
            self.iteration - 1,
            self.subset_size(),
            self.collected_bytes.load(Ordering::Relaxed)
        );
    }

    fn collect_thread(
        &self,
        worker_count: usize,
        budget_bytes: usize,
        thread_index: usize,
        strict: bool,
    ) {
        let neuron_count = self.net.neuron_count() as u32;
        let cursor = self.output_layer_cursor.load(Ordering::Acquire);
        // Spread the workers over the unprocessed output layer so their
        // traversals start as disjoint as possible.
        let seed =
            cursor + ((neuron_count - 1 - cursor) / worker_count as u32) * thread_index as u32;
        let mut visiting = vec![seed];
        // A dependency path can never be longer than the net itself; a
        // deeper stack means the traversal is circling and this thread
        // gives up, leaving the no-progress diagnosis to the caller.
        while *visiting.last().expect("visiting stack never empties") < neuron_count
            && visiting.len() <= self.net.neuron_count()
            && self.collected_bytes.load(Ordering::Acquire) <= budget_bytes
        {
            let visiting_next = self.next_neuron(&visiting, strict);
            self.try_reserve(*visiting.last().expect("visiting stack never empties"));
            self.step(&mut visiting, visiting_next);
        }
    }

    /// Examine the neuron on top of the visiting stack and decide where the
    /// traversal moves next, updating the neuron's progress state on the way.
    fn next_neuron(&self, visiting: &[u32], strict: bool) -> u32 {
        let iteration = self.iteration;
        let current = *visiting.last().expect("visiting stack never empties");
        let mut visiting_next = current;
        let mut processed_inputs = 0u32;

        while self.is_subset_candidate(current, iteration)
            && processed_inputs < self.neuron_input_counts[current as usize]
            && visiting_next == current
        {
            let neuron = &self.net.neurons[current as usize];
            let iter = SynapseIterator::new(&neuron.input_indices);
            let snapshot = self.neuron_states[current as usize].load(Ordering::Acquire);

            // Resume behind the inputs an earlier visit already accounted
            // for, so repeated visits do not rescan the same prefix.
            let mut start_span = 0usize;
            let mut span_base = 0u32;
            if self.is_in_progress(current) {
                iter.skim_terminatable(|span| {
                    if span_base + span.size < snapshot {
                        start_span += 1;
                        span_base += span.size;
                        true
                    } else {
                        false
                    }
                });
            }
            processed_inputs = span_base;
            iter.iterate_terminatable_pairs_from(start_span, |span, input_index| {
                if is_input_reference(input_index)
                    || span.reach_past > 0
                    || self.is_processed(input_index as u32)
                    || (!strict && self.is_reserved(input_index as u32))
                {
                    // Tape data, history data and processed producers are
                    // all available; outside strict mode a reserved producer
                    // counts too, which tends to pull whole dependency
                    // chains into one subset.
                    processed_inputs += 1;
                    true
                } else if self.is_subset_candidate(input_index as u32, iteration) {
                    visiting_next = input_index as u32;
                    false
                } else {
                    true
                }
            });

            let state = &self.neuron_states[current as usize];
            if processed_inputs < self.neuron_input_counts[current as usize]
                && visiting_next == current
            {
                // Unsatisfied inputs but nowhere to descend: every blocker
                // is reserved or deferred. Park the neuron for a later
                // iteration. A racing thread may have moved the state on,
                // in which case the CAS is simply skipped.
                let _ = state.compare_exchange(
                    snapshot,
                    self.deferred_value(current, iteration),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            } else {
                let _ = state.compare_exchange(
                    snapshot,
                    processed_inputs,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
        }
        visiting_next
    }

    /// Reserve a solvable neuron and append it to the shared subset.
    ///
    /// Reservation and queueing happen under one lock: a traversal that saw
    /// a prerequisite as reserved can only append the dependent neuron after
    /// the prerequisite itself was queued, so subset order always respects
    /// the dependency order.
    fn try_reserve(&self, index: u32) {
        let solvable = self.neuron_input_counts[index as usize];
        let mut subset = self.subset.lock();
        if self.neuron_states[index as usize]
            .compare_exchange(
                solvable,
                self.reserved_value(index),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            subset.push_back(index);
            let estimate = neuron_estimated_bytes(&self.net.neurons[index as usize]);
            self.collected_bytes.fetch_add(estimate, Ordering::AcqRel);
        }
    }

    /// Move the traversal: descend into a found child, otherwise backtrack.
    /// A stack reduced to its finalized seed advances to the next output
    /// neuron and drags the output-layer cursor along.
    fn step(&self, visiting: &mut Vec<u32>, visiting_next: u32) {
        let neuron_count = self.net.neuron_count() as u32;
        let top = *visiting.last().expect("visiting stack never empties");
        if visiting_next != top {
            visiting.push(visiting_next);
        } else if visiting.len() > 1 {
            visiting.pop();
        }
        if visiting.len() == 1 {
            let index = visiting[0];
            if index < neuron_count {
                if !self.is_in_progress(index) && !self.is_subset_candidate(index, self.iteration)
                {
                    // Processed, reserved or deferred: move to the next
                    // output neuron. Running past the array end just means
                    // this thread is done for the current iteration.
                    visiting[0] += 1;
                }
                if self.is_processed(index) && index < neuron_count - 1 {
                    // The cursor may have been advanced by another thread
                    // meanwhile, which is fine.
                    let _ = self.output_layer_cursor.compare_exchange(
                        index,
                        index + 1,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    );
                }
            }
        }
    }

    /// Number of neurons currently queued in the subset.
    pub fn subset_size(&self) -> usize {
        self.subset.lock().len()
    }

    /// The queued neuron at `position`, when no collection is running.
    pub fn subset_element(&self, position: usize) -> Option<u32> {
        if self.collection_running {
            return None;
        }
        self.subset.lock().get(position).copied()
    }

    /// The first queued neuron, if any.
    pub fn first(&self) -> Option<u32> {
        self.subset_element(0)
    }

    /// Confirm the head of the subset as processed and remove it.
    ///
    /// The caller passes the index it believes is at the head; a mismatch
    /// leaves the router untouched and returns `false`.
    pub fn confirm_processed(&self, index: u32) -> bool {
        let mut subset = self.subset.lock();
        if subset.front() == Some(&index) {
            self.neuron_states[index as usize]
                .store(self.processed_value(index), Ordering::Release);
            subset.pop_front();
            true
        } else {
            false
        }
    }

    /// Remove the head of the subset and make the neuron eligible again.
    pub fn confirm_omitted(&self, index: u32) -> bool {
        let mut subset = self.subset.lock();
        if subset.front() == Some(&index) {
            self.neuron_states[index as usize].store(0, Ordering::Release);
            subset.pop_front();
            true
        } else {
            false
        }
    }

    /// Omit every queued neuron from position `keep` onwards, making them
    /// eligible for the next collection pass.
    pub fn reset_remaining(&self, keep: usize) {
        let mut subset = self.subset.lock();
        while subset.len() > keep {
            let index = subset
                .pop_back()
                .expect("subset length was checked above");
            self.neuron_states[index as usize].store(0, Ordering::Release);
        }
    }

    /// Overwrite the byte accumulator, typically with the measured size of
    /// the partition under construction after a close or split.
    pub fn set_collected_bytes(&self, bytes: usize) {
        self.collected_bytes.store(bytes, Ordering::Release);
    }

    /// Whether `index` still has unsatisfied inputs.
    pub fn is_in_progress(&self, index: u32) -> bool {
        self.neuron_states[index as usize].load(Ordering::Acquire)
            < self.neuron_input_counts[index as usize]
    }

    /// Whether every input of `index` is satisfied but it is not yet claimed.
    pub fn is_solvable(&self, index: u32) -> bool {
        self.neuron_states[index as usize].load(Ordering::Acquire)
            == self.neuron_input_counts[index as usize]
    }

    /// Whether `index` is claimed for the subset being collected.
    pub fn is_reserved(&self, index: u32) -> bool {
        self.neuron_states[index as usize].load(Ordering::Acquire) == self.reserved_value(index)
    }

    /// Whether `index` has been finalized.
    pub fn is_processed(&self, index: u32) -> bool {
        self.neuron_states[index as usize].load(Ordering::Acquire) == self.processed_value(index)
    }

    fn reserved_value(&self, index: u32) -> u32 {
        self.neuron_input_counts[index as usize] + 1
    }

    fn processed_value(&self, index: u32) -> u32 {
        self.neuron_input_counts[index as usize] + 2
    }

    fn deferred_value(&self, index: u32, iteration: u16) -> u32 {
        self.processed_value(index) + iteration as u32 + 1
    }

    /// How many iterations away the neuron's deferred revisit lies; zero for
    /// anything not deferred.
    fn iteration_relevance(&self, index: u32) -> u32 {
        let state = self.neuron_states[index as usize].load(Ordering::Acquire);
        state.saturating_sub(self.processed_value(index))
    }

    fn is_subset_candidate(&self, index: u32, iteration: u16) -> bool {
        self.iteration_relevance(index) <= iteration as u32
            && !self.is_processed(index)
            && !self.is_reserved(index)
    }
}
