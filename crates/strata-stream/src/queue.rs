//! Nearest-first queue of coordinates waiting for a pipeline.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use strata_voxel::ChunkCoordinate;

/// Priority queue keyed by squared distance to the focus.
///
/// Uses a min-heap so the nearest chunks leave first. Cancellation is lazy:
/// the heap may hold entries whose coordinate was cancelled or re-queued with
/// a new priority, and those are skipped on dequeue.
#[derive(Debug, Default)]
pub struct BatchQueue {
    heap: BinaryHeap<Reverse<(u64, ChunkCoordinate)>>,
    /// Live entries and their current priority.
    pending: FxHashMap<ChunkCoordinate, u64>,
}

impl BatchQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coord`. Returns `false` if it was already queued.
    pub fn enqueue(&mut self, coord: ChunkCoordinate, priority: u64) -> bool {
        if self.pending.contains_key(&coord) {
            return false;
        }
        self.pending.insert(coord, priority);
        self.heap.push(Reverse((priority, coord)));
        true
    }

    /// Removes and returns the nearest coordinate.
    pub fn dequeue(&mut self) -> Option<ChunkCoordinate> {
        while let Some(Reverse((priority, coord))) = self.heap.pop() {
            if self.pending.get(&coord) == Some(&priority) {
                self.pending.remove(&coord);
                return Some(coord);
            }
        }
        None
    }

    /// Removes up to `max` nearest coordinates.
    pub fn dequeue_batch(&mut self, max: usize) -> Vec<ChunkCoordinate> {
        let mut batch = Vec::with_capacity(max.min(self.len()));
        while batch.len() < max {
            let Some(coord) = self.dequeue() else {
                break;
            };
            batch.push(coord);
        }
        batch
    }

    /// Drops `coord` from the queue. Returns `true` if it was queued.
    pub fn cancel(&mut self, coord: ChunkCoordinate) -> bool {
        self.pending.remove(&coord).is_some()
    }

    /// Whether `coord` is queued.
    pub fn contains(&self, coord: ChunkCoordinate) -> bool {
        self.pending.contains_key(&coord)
    }

    /// Recomputes every priority against a new focus and rebuilds the heap,
    /// discarding cancelled entries.
    pub fn reprioritize(&mut self, focus: ChunkCoordinate) {
        for (coord, priority) in &mut self.pending {
            *priority = coord.distance_sq(focus);
        }
        self.heap = self
            .pending
            .iter()
            .map(|(coord, priority)| Reverse((*priority, *coord)))
            .collect();
    }

    /// Number of queued coordinates.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Empties the queue.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
