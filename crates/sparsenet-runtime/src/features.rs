//! Whole-layer post-step transforms over neuron subsets

use parking_lot::Mutex;

use sparsenet_model::{FeatureGroup, FeatureKind, SynapseInterval, SynapseIterator};
use sparsenet_utils::{SharedFrame, ThreadGroup};

/// Apply a feature group to the frame of the step that just completed.
pub fn execute_feature_group(group: &FeatureGroup, frame: SharedFrame<'_>, threads: &ThreadGroup) {
    match group.kind {
        FeatureKind::Softmax => softmax(&group.relevant_neurons, frame, threads),
    }
}

/// Numerically stable softmax over the referenced neuron slots.
///
/// Two passes through the worker pool: the first reduces the maximum and the
/// exponential sum, the second rewrites every covered slot as
/// `exp(x - max) / (expsum / exp(max))`. Subtracting the maximum keeps the
/// exponentials bounded; since the sum is collected before the maximum is
/// applied, it is corrected by `exp(max)` instead.
fn softmax(relevant_neurons: &[SynapseInterval], frame: SharedFrame<'_>, threads: &ThreadGroup) {
    let total = SynapseIterator::new(relevant_neurons).size();
    if total == 0 {
        return;
    }
    let per_worker = 1 + total / threads.thread_count() as u32;

    let reduced = Mutex::new((f64::NEG_INFINITY, 0.0f64));
    threads.start_and_block(|worker| {
        let iter = SynapseIterator::new(relevant_neurons);
        let start = total.min(per_worker * worker as u32);
        let count = per_worker.min(total - start);
        let mut worker_max = f64::NEG_INFINITY;
        let mut worker_expsum = 0.0;
        for position in start..start + count {
            // Feature groups reference neurons, never the input tape.
            let value = unsafe { frame.get(iter.at(position) as usize) };
            worker_expsum += value.exp();
            if value > worker_max {
                worker_max = value;
            }
        }
        if count > 0 {
            let mut shared = reduced.lock();
            shared.1 += worker_expsum;
            if worker_max > shared.0 {
                shared.0 = worker_max;
            }
        }
    });
    let (max_value, expsum) = reduced.into_inner();

    threads.start_and_block(|worker| {
        let iter = SynapseIterator::new(relevant_neurons);
        let start = total.min(per_worker * worker as u32);
        let count = per_worker.min(total - start);
        for position in start..start + count {
            let slot = iter.at(position) as usize;
            unsafe {
                let value = frame.get(slot);
                frame.set(
                    slot,
                    (value - max_value).exp() / (expsum / max_value.exp()),
                );
            }
        }
    });
}
