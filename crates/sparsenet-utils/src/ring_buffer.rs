//! Circular storage of per-step neuron activation frames
//!
//! The life-cycle of a network evaluation counts one solved step as a "loop":
//! the activation of every neuron is computed and written into a dense frame.
//! The ring buffer keeps the frame of the current loop writable while giving
//! read access to the frames of previous loops, which is what recurrent
//! synapse references reach back into.

/// Fixed-capacity ring of activation frames.
///
/// Frame `0` is the one currently being written; frame `k` holds the data of
/// the `k`-th previous step. [`DataRingbuffer::step`] advances the head and,
/// when more than one frame is kept, seeds the new head with a copy of the
/// previous one so every neuron starts a step from its last activation.
#[derive(Debug, Clone)]
pub struct DataRingbuffer {
    head: usize,
    frames: Vec<Vec<f64>>,
}

impl DataRingbuffer {
    /// Create a buffer of `frame_count` zeroed frames of `width` elements.
    ///
    /// # Panics
    /// Panics if `frame_count` is zero.
    pub fn new(frame_count: usize, width: usize) -> Self {
        assert!(frame_count > 0, "a ring buffer needs at least one frame");
        Self {
            head: 0,
            frames: vec![vec![0.0; width]; frame_count],
        }
    }

    /// Number of frames kept, i.e. how many steps of history are visible.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Number of elements per frame.
    pub fn width(&self) -> usize {
        self.frames[0].len()
    }

    /// Advance the head to a fresh frame for the next step.
    ///
    /// With more than one frame the previous head is copied into the new one,
    /// so recurrent neurons observe their last activation as initial state.
    /// With a single frame the data is simply left in place.
    pub fn step(&mut self) {
        self.head = (self.head + 1) % self.frames.len();
        if self.frames.len() > 1 {
            let previous = self.frame_index(1);
            let (source, target) = twin_frames(&mut self.frames, previous, self.head);
            target.copy_from_slice(source);
        }
    }

    /// Zero every frame and rewind the head to its initial position.
    pub fn reset(&mut self) {
        for frame in &mut self.frames {
            frame.fill(0.0);
        }
        self.head = 0;
    }

    /// Discard the newest frame: zero it and move the head one step back.
    pub fn pop_front(&mut self) {
        let head = self.head;
        self.frames[head].fill(0.0);
        self.head = self.frame_index(1);
    }

    /// Take over the newest frame of `other`.
    ///
    /// # Panics
    /// Panics if the frame widths differ.
    pub fn copy_latest(&mut self, other: &DataRingbuffer) {
        let head = self.head;
        self.frames[head].copy_from_slice(other.get(0));
    }

    /// Frame of the `past`-th previous step; `past == 0` is the current one.
    ///
    /// # Panics
    /// Panics if `past` is not below the frame count.
    pub fn get(&self, past: usize) -> &[f64] {
        assert!(
            past < self.frames.len(),
            "ring buffer past index {past} out of bounds (capacity {})",
            self.frames.len()
        );
        &self.frames[self.frame_index(past)]
    }

    /// Mutable access to the frame of the `past`-th previous step.
    ///
    /// # Panics
    /// Panics if `past` is not below the frame count.
    pub fn get_mut(&mut self, past: usize) -> &mut [f64] {
        assert!(
            past < self.frames.len(),
            "ring buffer past index {past} out of bounds (capacity {})",
            self.frames.len()
        );
        let index = self.frame_index(past);
        &mut self.frames[index]
    }

    /// The frame currently being written.
    pub fn current(&self) -> &[f64] {
        self.get(0)
    }

    /// Mutable access to the frame currently being written.
    pub fn current_mut(&mut self) -> &mut [f64] {
        self.get_mut(0)
    }

    /// Bounds-checked scalar read of element `index`, `past` steps back.
    ///
    /// # Panics
    /// Panics if either index is out of bounds.
    pub fn element(&self, index: usize, past: usize) -> f64 {
        let frame = self.get(past);
        assert!(
            index < frame.len(),
            "ring buffer element index {index} out of bounds (width {})",
            frame.len()
        );
        frame[index]
    }

    /// Past offset of the frame a solver at `sequence_index` observes with
    /// reach-back `past`, when the buffer retains a whole unrolled sequence.
    ///
    /// Sequences are evaluated front to back, so once every sample of a
    /// sequence is solved the frame of the last sample sits at past offset 0
    /// and earlier samples at increasing offsets. A result at or beyond
    /// [`DataRingbuffer::frame_count`] means the reference reaches past the
    /// recorded history.
    pub fn sequence_frame_index(&self, sequence_index: usize, past: usize) -> usize {
        (self.frames.len() - sequence_index - 1) + past
    }

    /// Split the buffer into the writable head frame and a read-only view of
    /// the remaining history frames.
    pub fn split_current(&mut self) -> (&mut [f64], RingHistory<'_>) {
        let head = self.head;
        let capacity = self.frames.len();
        let (before, rest) = self.frames.split_at_mut(head);
        let (current, after) = rest
            .split_first_mut()
            .expect("a ring buffer always owns its head frame");
        (
            current.as_mut_slice(),
            RingHistory {
                before,
                after,
                head,
                capacity,
            },
        )
    }

    fn frame_index(&self, past: usize) -> usize {
        if self.head >= past {
            self.head - past
        } else {
            self.head + self.frames.len() - past
        }
    }
}

/// Read-only view of the history frames while the head frame is checked out
/// through [`DataRingbuffer::split_current`].
#[derive(Debug)]
pub struct RingHistory<'a> {
    before: &'a [Vec<f64>],
    after: &'a [Vec<f64>],
    head: usize,
    capacity: usize,
}

impl RingHistory<'_> {
    /// Total frame count of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frame of the `past`-th previous step, `1 <= past < capacity`.
    ///
    /// # Panics
    /// Panics when `past` is zero (the head frame is checked out separately)
    /// or reaches beyond the retained history.
    pub fn past(&self, past: usize) -> &[f64] {
        assert!(
            past > 0 && past < self.capacity,
            "ring history past index {past} out of bounds (capacity {})",
            self.capacity
        );
        let index = if self.head >= past {
            self.head - past
        } else {
            self.head + self.capacity - past
        };
        if index < self.head {
            &self.before[index]
        } else {
            &self.after[index - self.head - 1]
        }
    }
}

fn twin_frames(frames: &mut [Vec<f64>], source: usize, target: usize) -> (&[f64], &mut [f64]) {
    debug_assert_ne!(source, target);
    if source < target {
        let (left, right) = frames.split_at_mut(target);
        (&left[source], &mut right[0])
    } else {
        let (left, right) = frames.split_at_mut(source);
        (&right[0], &mut left[target])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_is_zeroed() {
        let buffer = DataRingbuffer::new(5, 30);
        assert_eq!(buffer.frame_count(), 5);
        assert_eq!(buffer.width(), 30);
        for past in 0..5 {
            assert!(buffer.get(past).iter().all(|&value| value == 0.0));
        }
    }

    #[test]
    fn step_copies_previous_frame_forward() {
        let mut buffer = DataRingbuffer::new(3, 4);
        buffer.current_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        buffer.step();
        assert_eq!(buffer.get(0), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buffer.get(1), &[1.0, 2.0, 3.0, 4.0]);

        buffer.current_mut()[0] = 9.0;
        assert_eq!(buffer.get(0)[0], 9.0);
        assert_eq!(buffer.get(1)[0], 1.0);
    }

    #[test]
    fn single_frame_step_keeps_data_in_place() {
        let mut buffer = DataRingbuffer::new(1, 2);
        buffer.current_mut().copy_from_slice(&[5.0, 6.0]);
        buffer.step();
        assert_eq!(buffer.current(), &[5.0, 6.0]);
    }

    #[test]
    fn history_stays_consistent_over_many_steps() {
        let frame_count = 5;
        let width = 30;
        let mut expected = vec![0.0; width];
        let mut previous_expected = vec![0.0; width];
        let mut buffer = DataRingbuffer::new(frame_count, width);

        for _ in 0..(frame_count * 2) {
            assert_eq!(buffer.get(0), expected.as_slice());
            assert_eq!(buffer.get(1), previous_expected.as_slice());
            previous_expected.copy_from_slice(&expected);
            buffer.step();
            for (slot, value) in expected.iter_mut().enumerate() {
                *value += slot as f64;
            }
            buffer.current_mut().copy_from_slice(&expected);
        }
    }

    #[test]
    fn pop_front_discards_the_newest_frame() {
        let mut buffer = DataRingbuffer::new(3, 2);
        buffer.current_mut().copy_from_slice(&[1.0, 1.0]);
        buffer.step();
        buffer.current_mut().copy_from_slice(&[2.0, 2.0]);
        buffer.pop_front();
        assert_eq!(buffer.current(), &[1.0, 1.0]);
    }

    #[test]
    fn reset_restores_the_initial_state() {
        let mut buffer = DataRingbuffer::new(2, 3);
        buffer.current_mut().copy_from_slice(&[1.0, 2.0, 3.0]);
        buffer.step();
        buffer.reset();
        assert!(buffer.get(0).iter().all(|&value| value == 0.0));
        assert!(buffer.get(1).iter().all(|&value| value == 0.0));
    }

    #[test]
    fn sequence_frame_indices_count_back_from_the_last_sample() {
        let buffer = DataRingbuffer::new(5, 1);
        assert_eq!(buffer.sequence_frame_index(4, 0), 0);
        assert_eq!(buffer.sequence_frame_index(0, 0), 4);
        assert_eq!(buffer.sequence_frame_index(2, 1), 3);
        // Reaching further back than recorded history lands out of range.
        assert!(buffer.sequence_frame_index(0, 1) >= buffer.frame_count());
    }

    #[test]
    fn split_current_exposes_head_and_history() {
        let mut buffer = DataRingbuffer::new(3, 2);
        buffer.current_mut().copy_from_slice(&[1.0, 1.0]);
        buffer.step();
        buffer.current_mut().copy_from_slice(&[2.0, 2.0]);
        buffer.step();

        let (current, history) = buffer.split_current();
        current[0] = 7.0;
        assert_eq!(history.past(1), &[2.0, 2.0]);
        assert_eq!(history.past(2), &[1.0, 1.0]);
        assert_eq!(buffer.get(0)[0], 7.0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn past_access_beyond_capacity_panics() {
        let buffer = DataRingbuffer::new(2, 1);
        let _ = buffer.get(2);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn history_rejects_the_head_frame() {
        let mut buffer = DataRingbuffer::new(2, 1);
        let (_, history) = buffer.split_current();
        let _ = history.past(0);
    }
}
