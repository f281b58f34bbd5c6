//! Read-only cross-chunk lookup used by meshing kernels.
//!
//! A [`ChunkAccessor`] is built on the owning thread from the store, covers the
//! 27-neighbourhood of every chunk in a batch, and is then shared immutably
//! with worker threads. It holds `Arc`s to the store's chunks, so building
//! it copies no block data and later store mutations never affect it.

use std::sync::Arc;

use glam::IVec3;
use rustc_hash::FxHashMap;

use crate::chunk::{Chunk, ChunkExtent};
use crate::coordinate::ChunkCoordinate;
use crate::registry::BlockId;

/// Immutable snapshot mapping coordinates to chunks.
#[derive(Clone, Debug)]
pub struct ChunkAccessor {
    extent: ChunkExtent,
    chunks: FxHashMap<ChunkCoordinate, Arc<Chunk>>,
}

impl ChunkAccessor {
    /// Creates an empty accessor.
    pub fn new(extent: ChunkExtent) -> Self {
        Self {
            extent,
            chunks: FxHashMap::default(),
        }
    }

    /// Builds an accessor directly from chunks.
    pub fn from_chunks(extent: ChunkExtent, chunks: impl IntoIterator<Item = Arc<Chunk>>) -> Self {
        let mut accessor = Self::new(extent);
        for chunk in chunks {
            accessor.insert(chunk);
        }
        accessor
    }

    pub(crate) fn insert(&mut self, chunk: Arc<Chunk>) {
        self.chunks.insert(chunk.coordinate(), chunk);
    }

    /// Chunk extent shared by every chunk in the snapshot.
    pub fn extent(&self) -> ChunkExtent {
        self.extent
    }

    /// Number of chunks in the snapshot.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the snapshot holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether the snapshot holds `coord`.
    pub fn contains(&self, coord: ChunkCoordinate) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// The chunk at `coord`.
    pub fn chunk(&self, coord: ChunkCoordinate) -> Option<&Chunk> {
        self.chunks.get(&coord).map(Arc::as_ref)
    }

    /// Translates a local position relative to `coord`, possibly outside its
    /// extent, into the owning chunk and the position local to that chunk.
    pub fn resolve(&self, coord: ChunkCoordinate, local: IVec3) -> (ChunkCoordinate, IVec3) {
        if self.extent.contains(local) {
            return (coord, local);
        }
        let world = coord.origin() + local;
        let owner = ChunkCoordinate::containing(world, self.extent);
        (owner, world - owner.origin())
    }

    /// Block at `local` relative to `coord`, following neighbours across
    /// chunk boundaries. `None` if the owning chunk is not in the snapshot.
    pub fn block(&self, coord: ChunkCoordinate, local: IVec3) -> Option<BlockId> {
        let (owner, owner_local) = self.resolve(coord, local);
        self.chunks
            .get(&owner)
            .and_then(|chunk| chunk.data().try_get(owner_local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkData;

    const STONE: BlockId = BlockId(1);

    fn extent() -> ChunkExtent {
        ChunkExtent::cube(4)
    }

    fn filled(coord: ChunkCoordinate, block: BlockId) -> Arc<Chunk> {
        Arc::new(Chunk::new(coord, ChunkData::filled(extent(), block)))
    }

    #[test]
    fn test_resolve_inside_is_identity() {
        let accessor = ChunkAccessor::new(extent());
        let coord = ChunkCoordinate::new(4, 0, -4);
        let local = IVec3::new(1, 2, 3);
        assert_eq!(accessor.resolve(coord, local), (coord, local));
    }

    #[test]
    fn test_resolve_crosses_into_neighbors() {
        let accessor = ChunkAccessor::new(extent());
        let coord = ChunkCoordinate::new(0, 0, 0);
        assert_eq!(
            accessor.resolve(coord, IVec3::new(-1, 0, 2)),
            (ChunkCoordinate::new(-4, 0, 0), IVec3::new(3, 0, 2))
        );
        assert_eq!(
            accessor.resolve(coord, IVec3::new(4, 4, -1)),
            (ChunkCoordinate::new(4, 4, -4), IVec3::new(0, 0, 3))
        );
    }

    #[test]
    fn test_block_reads_neighbor_data() {
        let center = ChunkCoordinate::new(0, 0, 0);
        let east = ChunkCoordinate::new(4, 0, 0);
        let accessor = ChunkAccessor::from_chunks(
            extent(),
            [filled(center, BlockId::AIR), filled(east, STONE)],
        );
        assert_eq!(accessor.len(), 2);
        assert_eq!(accessor.block(center, IVec3::new(3, 0, 0)), Some(BlockId::AIR));
        assert_eq!(accessor.block(center, IVec3::new(4, 0, 0)), Some(STONE));
        assert_eq!(accessor.block(center, IVec3::new(-1, 0, 0)), None);
    }
}
