//! Lazy expansion of synapse interval lists into signed indices
//!
//! Synapse iteration recurs in neuron routing, partition building and input
//! collection alike, so the expansion logic lives in one place. The iterator
//! borrows the interval list and never copies it.

use std::cell::Cell;

use crate::interval::SynapseSpan;

/// A non-owning view over a list of synapse intervals offering lazy
/// iteration over the signed indices they expand into.
///
/// Indices of an interval starting at a non-negative index ascend; indices of
/// an interval starting below zero descend, staying within the input-tape
/// half-plane. Subscripting through [`SynapseIterator::at`] keeps a cursor of
/// the last reached position, making sequential access amortized O(1); the
/// cursor resets on non-monotonic access.
pub struct SynapseIterator<'a, T: SynapseSpan> {
    spans: &'a [T],
    // (span index, flattened index of that span's first element)
    cursor: Cell<(usize, u32)>,
}

impl<'a, T: SynapseSpan> SynapseIterator<'a, T> {
    /// Wrap a borrowed interval list.
    pub fn new(spans: &'a [T]) -> Self {
        Self {
            spans,
            cursor: Cell::new((0, 0)),
        }
    }

    /// Overall number of indices the intervals expand into.
    pub fn size(&self) -> u32 {
        self.spans.iter().map(|span| span.size()).sum()
    }

    /// Number of intervals in the underlying list.
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Visit every expanded index in order.
    pub fn iterate(&self, mut for_each_index: impl FnMut(i32)) {
        self.iterate_pairs(|_, index| for_each_index(index));
    }

    /// Visit every expanded index along with its carrying interval.
    pub fn iterate_pairs(&self, mut for_each_index: impl FnMut(&T, i32)) {
        for span in self.spans {
            expand(span, |index| {
                for_each_index(span, index);
                true
            });
        }
    }

    /// Visit expanded indices until the callback declines to continue.
    ///
    /// Returns `true` if every index was visited, `false` on early stop.
    pub fn iterate_terminatable(&self, for_each_index: impl FnMut(i32) -> bool) -> bool {
        self.iterate_terminatable_from(0, for_each_index)
    }

    /// Like [`SynapseIterator::iterate_terminatable`], starting at the
    /// interval with index `start_span` instead of the first one.
    pub fn iterate_terminatable_from(
        &self,
        start_span: usize,
        mut for_each_index: impl FnMut(i32) -> bool,
    ) -> bool {
        for span in &self.spans[start_span.min(self.spans.len())..] {
            if !expand(span, &mut for_each_index) {
                return false;
            }
        }
        true
    }

    /// Like [`SynapseIterator::iterate_terminatable_from`], passing the
    /// carrying interval along with every expanded index.
    pub fn iterate_terminatable_pairs_from(
        &self,
        start_span: usize,
        mut for_each_index: impl FnMut(&T, i32) -> bool,
    ) -> bool {
        for span in &self.spans[start_span.min(self.spans.len())..] {
            if !expand(span, |index| for_each_index(span, index)) {
                return false;
            }
        }
        true
    }

    /// Visit only the intervals, without expanding them.
    pub fn skim(&self, mut for_each_span: impl FnMut(&T)) {
        for span in self.spans {
            for_each_span(span);
        }
    }

    /// Visit intervals until the callback declines to continue.
    ///
    /// Returns `true` if every interval was visited, `false` on early stop.
    pub fn skim_terminatable(&self, mut for_each_span: impl FnMut(&T) -> bool) -> bool {
        for span in self.spans {
            if !for_each_span(span) {
                return false;
            }
        }
        true
    }

    /// The expanded index at flattened position `index`.
    ///
    /// # Panics
    /// Panics when the iterator is empty or `index` lies beyond the overall
    /// size.
    pub fn at(&self, index: u32) -> i32 {
        assert!(
            !self.spans.is_empty(),
            "empty synapse iterator reached for subscript"
        );
        let (mut span_index, mut span_base) = self.cursor.get();
        if span_base > index {
            span_index = 0;
            span_base = 0;
        }
        while let Some(span) = self.spans.get(span_index) {
            if index < span_base + span.size() {
                self.cursor.set((span_index, span_base));
                let offset = (index - span_base) as i32;
                return if span.start() < 0 {
                    span.start() - offset
                } else {
                    span.start() + offset
                };
            }
            span_base += span.size();
            span_index += 1;
        }
        panic!(
            "synapse subscript {index} out of bounds (size {})",
            self.size()
        );
    }

    /// The last expanded index, honoring the sign direction of the final
    /// interval.
    ///
    /// # Panics
    /// Panics when the iterator is empty.
    pub fn back(&self) -> i32 {
        let span = self.last_span();
        if span.start() < 0 {
            span.start() - (span.size() as i32 - 1)
        } else {
            span.start() + (span.size() as i32 - 1)
        }
    }

    /// The final interval of the list.
    ///
    /// # Panics
    /// Panics when the iterator is empty.
    pub fn last_span(&self) -> &T {
        self.spans
            .last()
            .expect("last element requested from an empty synapse iterator")
    }
}

fn expand<T: SynapseSpan>(span: &T, mut for_each_index: impl FnMut(i32) -> bool) -> bool {
    let start = span.start();
    for offset in 0..span.size() as i32 {
        let index = if start < 0 {
            start - offset
        } else {
            start + offset
        };
        if !for_each_index(index) {
            return false;
        }
    }
    true
}
