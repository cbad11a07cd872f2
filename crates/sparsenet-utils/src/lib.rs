//! Shared execution utilities for the sparsenet compiler and runtime
//!
//! This crate hosts the pieces of machinery that both the partition compiler
//! and the solution runtime lean on: a reusable barrier-style worker pool,
//! the activation ring buffer holding per-step neuron data, and a shared
//! frame view for partitions scattering their results concurrently.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod ring_buffer;
pub mod shared_frame;
pub mod thread_group;

pub use ring_buffer::{DataRingbuffer, RingHistory};
pub use shared_frame::SharedFrame;
pub use thread_group::ThreadGroup;
