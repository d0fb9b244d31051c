//! Bounded lookback over earlier tracker states

use std::collections::VecDeque;

use crate::extruder::ExtruderState;
use crate::position::Position;

/// Fixed-capacity ring of `(Position, ExtruderState)` snapshots
///
/// The oldest entry is dropped once the capacity is reached.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    entries: VecDeque<(Position, ExtruderState)>,
    capacity: usize,
}

impl PositionHistory {
    /// Create an empty history holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a snapshot
    pub fn push(&mut self, position: Position, extruder: ExtruderState) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((position, extruder));
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Option<&(Position, ExtruderState)> {
        self.entries.back()
    }

    /// Snapshots from newest to oldest
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &(Position, ExtruderState)> {
        self.entries.iter().rev()
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no snapshot is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every snapshot
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
