//! Bounded, distance-prioritised owner of generated chunk data.
//!
//! The [`ChunkStore`] keeps every resident chunk behind an `Arc` so that
//! accessor snapshots can share data with worker threads without copying.
//! Each entry carries a priority equal to its squared distance to the current
//! focus; when a batch pushes the store past capacity, the farthest chunks
//! are evicted first.

use std::collections::BinaryHeap;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error};

use crate::accessor::ChunkAccessor;
use crate::chunk::{Chunk, ChunkExtent};
use crate::coordinate::ChunkCoordinate;

/// Fatal store errors. Both indicate a scheduling bug, not a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// `add_batch` received a coordinate that is already resident.
    #[error("chunk {0} is already resident in the store")]
    DuplicateChunk(ChunkCoordinate),
    /// `build_accessor` found a requested chunk or one of its neighbours missing.
    #[error("cannot build accessor for {coordinate}: neighbour {neighbor} is not resident")]
    MissingNeighbor {
        /// Coordinate whose neighbourhood was requested.
        coordinate: ChunkCoordinate,
        /// The absent chunk.
        neighbor: ChunkCoordinate,
    },
}

#[derive(Debug)]
struct StoreEntry {
    chunk: Arc<Chunk>,
    priority: u64,
}

/// Capacity-bounded map of resident chunks.
#[derive(Debug)]
pub struct ChunkStore {
    extent: ChunkExtent,
    capacity: usize,
    focus: ChunkCoordinate,
    chunks: FxHashMap<ChunkCoordinate, StoreEntry>,
}

impl ChunkStore {
    /// Creates an empty store that holds at most `capacity` chunks after each batch.
    pub fn new(extent: ChunkExtent, capacity: usize) -> Self {
        Self {
            extent,
            capacity,
            focus: ChunkCoordinate::default(),
            chunks: FxHashMap::default(),
        }
    }

    /// Chunk extent.
    pub fn extent(&self) -> ChunkExtent {
        self.extent
    }

    /// Maximum number of resident chunks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current focus chunk.
    pub fn focus(&self) -> ChunkCoordinate {
        self.focus
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether `coord` is resident.
    pub fn contains(&self, coord: ChunkCoordinate) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// The resident chunk at `coord`.
    pub fn get(&self, coord: ChunkCoordinate) -> Option<&Arc<Chunk>> {
        self.chunks.get(&coord).map(|entry| &entry.chunk)
    }

    /// Eviction priority of `coord` (larger = farther = evicted sooner).
    pub fn priority(&self, coord: ChunkCoordinate) -> Option<u64> {
        self.chunks.get(&coord).map(|entry| entry.priority)
    }

    /// Iterates over resident coordinates.
    pub fn coordinates(&self) -> impl Iterator<Item = ChunkCoordinate> + '_ {
        self.chunks.keys().copied()
    }

    /// Inserts a batch of chunks, then evicts the farthest residents until the
    /// store is back within capacity. Returns the evicted coordinates.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateChunk`] if any chunk is already resident or the
    /// batch repeats a coordinate; nothing is inserted in that case.
    pub fn add_batch(
        &mut self,
        chunks: impl IntoIterator<Item = Chunk>,
    ) -> Result<Vec<ChunkCoordinate>, StoreError> {
        let chunks: Vec<Chunk> = chunks.into_iter().collect();
        let mut incoming = FxHashSet::default();
        for chunk in &chunks {
            let coord = chunk.coordinate();
            if self.chunks.contains_key(&coord) || !incoming.insert(coord) {
                error!(%coord, "duplicate chunk insertion");
                return Err(StoreError::DuplicateChunk(coord));
            }
        }

        for chunk in chunks {
            let coord = chunk.coordinate();
            self.chunks.insert(
                coord,
                StoreEntry {
                    chunk: Arc::new(chunk),
                    priority: coord.distance_sq(self.focus),
                },
            );
        }

        let evicted = self.evict_over_capacity();
        if !evicted.is_empty() {
            debug!(count = evicted.len(), resident = self.len(), "evicted farthest chunks");
        }
        Ok(evicted)
    }

    /// Removes the `len - capacity` farthest chunks.
    fn evict_over_capacity(&mut self) -> Vec<ChunkCoordinate> {
        let excess = self.chunks.len().saturating_sub(self.capacity);
        if excess == 0 {
            return Vec::new();
        }
        // Max-heap on (priority, coordinate): farthest first, ties broken by coordinate.
        let mut heap: BinaryHeap<(u64, ChunkCoordinate)> = self
            .chunks
            .iter()
            .map(|(coord, entry)| (entry.priority, *coord))
            .collect();

        let mut evicted = Vec::with_capacity(excess);
        while evicted.len() < excess {
            let Some((_, coord)) = heap.pop() else {
                break;
            };
            self.chunks.remove(&coord);
            evicted.push(coord);
        }
        evicted
    }

    /// Removes `coord`, returning its chunk if it was resident.
    pub fn remove(&mut self, coord: ChunkCoordinate) -> Option<Arc<Chunk>> {
        self.chunks.remove(&coord).map(|entry| entry.chunk)
    }

    /// Recomputes every resident chunk's priority against a new focus.
    pub fn update_focus(&mut self, focus: ChunkCoordinate) {
        self.focus = focus;
        for (coord, entry) in &mut self.chunks {
            entry.priority = coord.distance_sq(focus);
        }
    }

    /// Builds a snapshot covering each requested coordinate and its 26 neighbours.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingNeighbor`] if any chunk of a requested
    /// neighbourhood is absent. This is fatal for the batch: coordinates must
    /// only be scheduled for meshing once their whole neighbourhood is loaded.
    pub fn build_accessor(&self, coords: &[ChunkCoordinate]) -> Result<ChunkAccessor, StoreError> {
        let mut accessor = ChunkAccessor::new(self.extent);
        for &coordinate in coords {
            for neighbor in coordinate.neighborhood(self.extent) {
                if accessor.contains(neighbor) {
                    continue;
                }
                let Some(entry) = self.chunks.get(&neighbor) else {
                    error!(%coordinate, %neighbor, "accessor build found a missing neighbour");
                    return Err(StoreError::MissingNeighbor {
                        coordinate,
                        neighbor,
                    });
                };
                accessor.insert(Arc::clone(&entry.chunk));
            }
        }
        Ok(accessor)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
