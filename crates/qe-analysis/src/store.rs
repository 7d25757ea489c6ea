//! Ordered multiplicity-keyed event storage.
//!
//! One store lives for exactly one analysis pass: populated during
//! classification, mutated only by appending during subtraction, then
//! drained into the output sample.

use crate::event::Event;
use qe_core::{Error, Result};
use std::collections::BTreeMap;

/// Mapping from hadron multiplicity to an insertion-ordered event list.
#[derive(Debug, Default)]
pub struct MultiplicityStore {
    buckets: BTreeMap<u32, Vec<Event>>,
    subtracted: bool,
}

impl MultiplicityStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the bucket for `multiplicity`.
    ///
    /// The event's hadron count must equal the bucket key; a mismatch is a
    /// bookkeeping bug, not a physics outcome.
    pub fn append(&mut self, multiplicity: u32, event: Event) -> Result<()> {
        let hadrons = event.detected.hadron_multiplicity();
        if hadrons != multiplicity {
            return Err(Error::Validation(format!(
                "event {} carries {hadrons} hadrons but was routed to bucket {multiplicity}",
                event.id
            )));
        }
        self.buckets.entry(multiplicity).or_default().push(event);
        Ok(())
    }

    /// Events at a multiplicity, in insertion order. Empty when the bucket
    /// does not exist.
    pub fn bucket(&self, multiplicity: u32) -> &[Event] {
        self.buckets.get(&multiplicity).map_or(&[], Vec::as_slice)
    }

    /// Number of events currently in a bucket.
    pub fn bucket_len(&self, multiplicity: u32) -> usize {
        self.buckets.get(&multiplicity).map_or(0, Vec::len)
    }

    /// Clone of the event at `(multiplicity, index)`, if present.
    pub(crate) fn event_at(&self, multiplicity: u32, index: usize) -> Option<Event> {
        self.buckets.get(&multiplicity).and_then(|b| b.get(index)).cloned()
    }

    /// Multiplicities with at least one event, ascending.
    pub fn occupied_multiplicities(&self) -> impl Iterator<Item = u32> + '_ {
        self.buckets.iter().filter(|(_, v)| !v.is_empty()).map(|(&m, _)| m)
    }

    /// Whether the subtraction driver has already run over this store.
    pub fn is_subtracted(&self) -> bool {
        self.subtracted
    }

    pub(crate) fn mark_subtracted(&mut self) {
        self.subtracted = true;
    }

    /// Remove and return the events of one bucket, in insertion order.
    pub(crate) fn take_bucket(&mut self, multiplicity: u32) -> Vec<Event> {
        self.buckets.remove(&multiplicity).unwrap_or_default()
    }
}
