//! Unacknowledged-input log kept by a controlling client.
//!
//! - Append-only, in creation order (timestamps non-decreasing)
//! - Pruned on every authoritative snapshot: inputs at or before the
//!   snapshot's last input timestamp are known-applied and dropped
//! - Bounded: when the authority stops acknowledging, the oldest input is
//!   evicted

use std::collections::VecDeque;

use kartsync_sim::{MotionInput, Seconds};

/// Inputs predicted locally but not yet reflected in an authoritative
/// snapshot.
#[derive(Debug, Clone)]
pub struct UnacknowledgedInputs {
    inputs: VecDeque<MotionInput>,
    capacity: usize,
}

impl UnacknowledgedInputs {
    /// Create a log holding at most `capacity` inputs (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inputs: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an input. Returns the evicted oldest input if the log was full.
    pub fn push(&mut self, input: MotionInput) -> Option<MotionInput> {
        if let Some(last) = self.inputs.back()
            && input.timestamp < last.timestamp
        {
            tracing::warn!(
                timestamp = input.timestamp,
                previous = last.timestamp,
                "input timestamp went backwards; replay order may diverge"
            );
        }

        self.inputs.push_back(input);

        if self.inputs.len() > self.capacity {
            let evicted = self.inputs.pop_front();
            tracing::warn!(
                capacity = self.capacity,
                "unacknowledged input log full; evicting oldest input"
            );
            evicted
        } else {
            None
        }
    }

    /// Keep only inputs with `timestamp > acknowledged`, in original order.
    /// Returns how many inputs were removed.
    pub fn prune_acknowledged(&mut self, acknowledged: Seconds) -> usize {
        let before = self.inputs.len();
        self.inputs.retain(|input| input.timestamp > acknowledged);
        before - self.inputs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotionInput> {
        self.inputs.iter()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }
}
