//! Synapse intervals: the compact index representation used across the model
//!
//! An interval `(start, size)` stands for `size` consecutive signed indices.
//! A non-negative `start` expands upwards (`start, start+1, …`), a negative
//! `start` expands downwards (`start, start-1, …`). Negative indices address
//! the external input tape through a total bijection; non-negative indices
//! address neurons.

/// Common access to the two interval kinds, so iteration code can stay
/// generic over whether a reach-back annotation is present.
pub trait SynapseSpan: Copy {
    /// First signed index of the interval
    fn start(&self) -> i32;
    /// Number of indices the interval expands into
    fn size(&self) -> u32;
    /// How many steps into the past the referenced data lies
    fn reach_past(&self) -> u32 {
        0
    }
}

/// An index interval without temporal annotation, used for weight references,
/// output lists and partition-internal input lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynapseInterval {
    /// First signed index
    pub start: i32,
    /// Number of indices
    pub size: u32,
}

impl SynapseInterval {
    /// Create an interval starting at `start` spanning `size` indices.
    pub const fn new(start: i32, size: u32) -> Self {
        Self { start, size }
    }
}

impl SynapseSpan for SynapseInterval {
    fn start(&self) -> i32 {
        self.start
    }

    fn size(&self) -> u32 {
        self.size
    }
}

/// An index interval carrying a reach-back annotation: `reach_past` marks how
/// many solved steps ago the referenced data was produced. Used for neuron
/// inputs and partition gather lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputSynapseInterval {
    /// First signed index
    pub start: i32,
    /// Number of indices
    pub size: u32,
    /// Steps into the past the referenced data lies; 0 is the current step
    pub reach_past: u32,
}

impl InputSynapseInterval {
    /// Create an interval over current-step data.
    pub const fn new(start: i32, size: u32) -> Self {
        Self {
            start,
            size,
            reach_past: 0,
        }
    }

    /// Create an interval reaching `reach_past` steps back.
    pub const fn reaching(start: i32, size: u32, reach_past: u32) -> Self {
        Self {
            start,
            size,
            reach_past,
        }
    }
}

impl SynapseSpan for InputSynapseInterval {
    fn start(&self) -> i32 {
        self.start
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn reach_past(&self) -> u32 {
        self.reach_past
    }
}

/// Whether a signed synapse index references the external input tape.
pub const fn is_input_reference(index: i32) -> bool {
    index < 0
}

/// Input-tape slot a negative synapse index refers to.
///
/// # Panics
/// Panics if `index` is non-negative, i.e. not an input-tape reference.
pub fn input_slot(index: i32) -> usize {
    assert!(
        index < 0,
        "synapse index {index} is not an input-tape reference"
    );
    (-(index as i64) - 1) as usize
}

/// Signed synapse index referencing input-tape slot `slot`.
pub fn input_reference(slot: usize) -> i32 {
    -(slot as i32) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tape_mapping_is_a_bijection() {
        for slot in 0..1000 {
            let index = input_reference(slot);
            assert!(is_input_reference(index));
            assert_eq!(input_slot(index), slot);
        }
        assert_eq!(input_reference(0), -1);
        assert_eq!(input_slot(-1), 0);
        assert_eq!(input_slot(-5), 4);
    }

    #[test]
    #[should_panic(expected = "not an input-tape reference")]
    fn neuron_indices_have_no_tape_slot() {
        let _ = input_slot(3);
    }

    #[test]
    fn reach_defaults_to_current_step() {
        let plain = SynapseInterval::new(2, 3);
        assert_eq!(plain.reach_past(), 0);
        let reaching = InputSynapseInterval::reaching(2, 3, 2);
        assert_eq!(reaching.reach_past(), 2);
    }
}
