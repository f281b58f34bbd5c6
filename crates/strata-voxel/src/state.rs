//! Per-coordinate lifecycle tracking.
//!
//! States are kept apart from chunk data so the streaming and meshing
//! pipelines can reason about a coordinate before its data exists. Absence
//! from the tracker is the UNLOADED state.

use rustc_hash::FxHashMap;

use crate::chunk::ChunkExtent;
use crate::coordinate::ChunkCoordinate;

/// Lifecycle state of a tracked coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Claimed by the data generation scheduler; no data yet.
    Streaming,
    /// Data resident in the store, no render resource.
    Loaded,
    /// Claimed by the mesh build scheduler.
    Meshing,
    /// Mesh applied to a pooled render object.
    Active,
}

impl ChunkState {
    /// States in which the store holds the coordinate's data.
    pub fn is_resident(self) -> bool {
        matches!(self, Self::Loaded | Self::Meshing | Self::Active)
    }
}

/// A requested transition did not match the coordinate's current state.
///
/// Non-fatal: callers log it and skip the coordinate for the current tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move chunk {coordinate} from {actual:?} to {next:?}")]
pub struct TransitionError {
    /// Coordinate whose transition was refused.
    pub coordinate: ChunkCoordinate,
    /// State found in the tracker (`None` = unloaded).
    pub actual: Option<ChunkState>,
    /// State that was requested.
    pub next: ChunkState,
}

/// Holds at most one [`ChunkState`] per coordinate.
#[derive(Debug, Default)]
pub struct ChunkStateTracker {
    states: FxHashMap<ChunkCoordinate, ChunkState>,
}

impl ChunkStateTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, `None` when unloaded.
    pub fn get(&self, coord: ChunkCoordinate) -> Option<ChunkState> {
        self.states.get(&coord).copied()
    }

    /// Moves an unloaded coordinate into `next`.
    pub fn claim(&mut self, coord: ChunkCoordinate, next: ChunkState) -> Result<(), TransitionError> {
        match self.get(coord) {
            None => {
                self.states.insert(coord, next);
                Ok(())
            }
            actual => Err(TransitionError {
                coordinate: coord,
                actual,
                next,
            }),
        }
    }

    /// Moves `coord` from `expected` to `next`.
    pub fn advance(
        &mut self,
        coord: ChunkCoordinate,
        expected: ChunkState,
        next: ChunkState,
    ) -> Result<(), TransitionError> {
        self.advance_from(coord, &[expected], next).map(|_| ())
    }

    /// Moves `coord` to `next` if its state is one of `allowed`, returning
    /// the previous state.
    pub fn advance_from(
        &mut self,
        coord: ChunkCoordinate,
        allowed: &[ChunkState],
        next: ChunkState,
    ) -> Result<ChunkState, TransitionError> {
        match self.states.get_mut(&coord) {
            Some(state) if allowed.contains(&*state) => Ok(std::mem::replace(state, next)),
            other => Err(TransitionError {
                coordinate: coord,
                actual: other.map(|s| *s),
                next,
            }),
        }
    }

    /// Forgets `coord` (back to unloaded), returning its last state.
    pub fn remove(&mut self, coord: ChunkCoordinate) -> Option<ChunkState> {
        self.states.remove(&coord)
    }

    /// Whether `coord`'s data is in the store.
    pub fn is_resident(&self, coord: ChunkCoordinate) -> bool {
        self.get(coord).is_some_and(ChunkState::is_resident)
    }

    /// Whether all 26 neighbours of `coord` are resident.
    pub fn neighborhood_resident(&self, coord: ChunkCoordinate, extent: ChunkExtent) -> bool {
        coord.neighbors(extent).all(|n| self.is_resident(n))
    }

    /// Number of tracked coordinates.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of coordinates in `state`.
    pub fn count(&self, state: ChunkState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// Iterates over all `(coordinate, state)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ChunkCoordinate, ChunkState)> + '_ {
        self.states.iter().map(|(c, s)| (*c, *s))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(x: i32) -> ChunkCoordinate {
        ChunkCoordinate::new(x * 16, 0, 0)
    }

    #[test]
    fn test_full_lifecycle() {
        let mut states = ChunkStateTracker::new();
        let c = coord(1);
        states.claim(c, ChunkState::Streaming).expect("unloaded");
        states
            .advance(c, ChunkState::Streaming, ChunkState::Loaded)
            .expect("streaming");
        states
            .advance(c, ChunkState::Loaded, ChunkState::Meshing)
            .expect("loaded");
        states
            .advance(c, ChunkState::Meshing, ChunkState::Active)
            .expect("meshing");
        assert_eq!(states.get(c), Some(ChunkState::Active));
        assert_eq!(states.remove(c), Some(ChunkState::Active));
        assert_eq!(states.get(c), None);
    }

    #[test]
    fn test_claim_of_tracked_coordinate_fails() {
        let mut states = ChunkStateTracker::new();
        let c = coord(0);
        states.claim(c, ChunkState::Streaming).expect("first claim");
        let err = states.claim(c, ChunkState::Streaming).unwrap_err();
        assert_eq!(err.actual, Some(ChunkState::Streaming));
        assert_eq!(states.len(), 1, "state map holds one entry per coordinate");
    }

    #[test]
    fn test_advance_from_wrong_state_leaves_state_unchanged() {
        let mut states = ChunkStateTracker::new();
        let c = coord(2);
        states.claim(c, ChunkState::Streaming).expect("claim");
        let err = states
            .advance(c, ChunkState::Loaded, ChunkState::Meshing)
            .unwrap_err();
        assert_eq!(err.next, ChunkState::Meshing);
        assert_eq!(states.get(c), Some(ChunkState::Streaming));

        let missing = states
            .advance(coord(9), ChunkState::Loaded, ChunkState::Meshing)
            .unwrap_err();
        assert_eq!(missing.actual, None);
    }

    #[test]
    fn test_advance_from_returns_previous() {
        let mut states = ChunkStateTracker::new();
        let c = coord(3);
        states.claim(c, ChunkState::Active).expect("claim");
        let previous = states
            .advance_from(c, &[ChunkState::Meshing, ChunkState::Active], ChunkState::Loaded)
            .expect("allowed");
        assert_eq!(previous, ChunkState::Active);
        assert_eq!(states.count(ChunkState::Loaded), 1);
    }

    #[test]
    fn test_neighborhood_resident() {
        let extent = ChunkExtent::cube(16);
        let center = ChunkCoordinate::new(0, 0, 0);
        let mut states = ChunkStateTracker::new();
        for n in center.neighbors(extent) {
            states.claim(n, ChunkState::Loaded).expect("claim");
        }
        assert!(states.neighborhood_resident(center, extent));

        let east = center.offset_chunks(1, 0, 0, extent);
        states
            .advance(east, ChunkState::Loaded, ChunkState::Active)
            .expect("loaded");
        assert!(states.neighborhood_resident(center, extent));

        states.remove(east);
        states.claim(east, ChunkState::Streaming).expect("claim");
        assert!(!states.neighborhood_resident(center, extent));
    }
}
