//! Chunk extents, run-length compressed chunk data, and the immutable
//! [`Chunk`] pairing owned by the store.

use glam::IVec3;

use crate::coordinate::ChunkCoordinate;
use crate::registry::BlockId;
use crate::rle::{BlockRun, RleError, RunEncoder, rle_decode, rle_encode};

/// Size of a chunk in blocks along each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkExtent {
    /// Blocks along X.
    pub x: u32,
    /// Blocks along Y.
    pub y: u32,
    /// Blocks along Z.
    pub z: u32,
}

impl ChunkExtent {
    /// Creates an extent. All components must be non-zero.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// A cubic extent.
    pub const fn cube(size: u32) -> Self {
        Self::new(size, size, size)
    }

    /// Number of cells in a chunk.
    pub fn volume(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Extent along `axis` (0 = X, 1 = Y, 2 = Z).
    pub fn axis(&self, axis: usize) -> u32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// The extent as a signed vector.
    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }

    /// Whether `local` lies inside `[0, extent)` on every axis.
    pub fn contains(&self, local: IVec3) -> bool {
        local.cmpge(IVec3::ZERO).all() && local.cmplt(self.as_ivec3()).all()
    }

    /// Linear cell index in iteration order: X varies fastest, then Y, then Z.
    pub fn linear_index(&self, x: u32, y: u32, z: u32) -> usize {
        x as usize + y as usize * self.x as usize + z as usize * self.x as usize * self.y as usize
    }
}

impl Default for ChunkExtent {
    fn default() -> Self {
        Self::cube(16)
    }
}

impl From<[u32; 3]> for ChunkExtent {
    fn from([x, y, z]: [u32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// Errors raised by point access into [`ChunkData`].
#[derive(Debug, thiserror::Error)]
pub enum ChunkDataError {
    /// The local coordinate is outside the chunk extent.
    #[error("local position {position} is outside chunk extent {extent:?}")]
    OutOfBounds {
        /// Requested local position.
        position: IVec3,
        /// Extent of the chunk.
        extent: ChunkExtent,
    },
}

// ---------------------------------------------------------------------------
// ChunkData
// ---------------------------------------------------------------------------

/// Run-length compressed block grid.
///
/// Runs cover the cells in iteration order (see [`ChunkExtent::linear_index`]).
/// The sum of run lengths always equals the chunk volume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkData {
    extent: ChunkExtent,
    runs: Vec<BlockRun>,
    /// `ends[i]` is the exclusive end cell index of `runs[i]`.
    ends: Vec<u32>,
}

impl ChunkData {
    /// A chunk where every cell holds `block`.
    pub fn filled(extent: ChunkExtent, block: BlockId) -> Self {
        let runs = vec![BlockRun {
            block,
            length: extent.volume() as u32,
        }];
        Self::from_canonical(extent, runs)
    }

    /// A chunk of air.
    pub fn empty(extent: ChunkExtent) -> Self {
        Self::filled(extent, BlockId::AIR)
    }

    /// Compresses a flat block array laid out in iteration order.
    pub fn from_blocks(extent: ChunkExtent, blocks: &[BlockId]) -> Result<Self, RleError> {
        if blocks.len() != extent.volume() {
            return Err(RleError::LengthMismatch {
                expected: extent.volume(),
                actual: blocks.len(),
            });
        }
        Ok(Self::from_canonical(extent, rle_encode(blocks)))
    }

    /// Builds chunk data from runs, merging adjacent equal runs and dropping
    /// empty ones.
    pub fn from_runs(extent: ChunkExtent, runs: &[BlockRun]) -> Result<Self, RleError> {
        let mut encoder = RunEncoder::new();
        for run in runs {
            encoder.push_run(run.block, run.length);
        }
        if encoder.len() != extent.volume() {
            return Err(RleError::LengthMismatch {
                expected: extent.volume(),
                actual: encoder.len(),
            });
        }
        Ok(Self::from_canonical(extent, encoder.finish()))
    }

    fn from_canonical(extent: ChunkExtent, runs: Vec<BlockRun>) -> Self {
        let mut data = Self {
            extent,
            runs,
            ends: Vec::new(),
        };
        data.rebuild_ends();
        data
    }

    fn rebuild_ends(&mut self) {
        self.ends.clear();
        let mut end = 0u32;
        for run in &self.runs {
            end += run.length;
            self.ends.push(end);
        }
    }

    /// Chunk extent.
    pub fn extent(&self) -> ChunkExtent {
        self.extent
    }

    /// The canonical run sequence.
    pub fn runs(&self) -> &[BlockRun] {
        &self.runs
    }

    /// Number of runs.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// The single block filling the chunk, if it is uniform.
    pub fn uniform_block(&self) -> Option<BlockId> {
        match self.runs.as_slice() {
            [run] => Some(run.block),
            _ => None,
        }
    }

    /// Index of the run containing cell `index`.
    fn run_at(&self, index: usize) -> usize {
        self.ends.partition_point(|&end| end as usize <= index)
    }

    /// Block at a linear cell index. `index` must be below the volume.
    pub fn get_index(&self, index: usize) -> BlockId {
        self.runs[self.run_at(index)].block
    }

    /// Block at a local position. Coordinates must be inside the extent.
    pub fn get(&self, x: u32, y: u32, z: u32) -> BlockId {
        debug_assert!(x < self.extent.x && y < self.extent.y && z < self.extent.z);
        self.get_index(self.extent.linear_index(x, y, z))
    }

    /// Block at a signed local position, or `None` outside the extent.
    pub fn try_get(&self, local: IVec3) -> Option<BlockId> {
        self.extent
            .contains(local)
            .then(|| self.get(local.x as u32, local.y as u32, local.z as u32))
    }

    /// Overwrites one cell by splitting the run that contains it.
    pub fn set(&mut self, local: IVec3, block: BlockId) -> Result<(), ChunkDataError> {
        if !self.extent.contains(local) {
            return Err(ChunkDataError::OutOfBounds {
                position: local,
                extent: self.extent,
            });
        }
        let index = self
            .extent
            .linear_index(local.x as u32, local.y as u32, local.z as u32);
        let run_index = self.run_at(index);
        let run = self.runs[run_index];
        if run.block == block {
            return Ok(());
        }

        let start = if run_index == 0 {
            0
        } else {
            self.ends[run_index - 1] as usize
        };
        let before = (index - start) as u32;
        let after = run.length - before - 1;

        let mut replacement = Vec::with_capacity(3);
        if before > 0 {
            replacement.push(BlockRun {
                block: run.block,
                length: before,
            });
        }
        replacement.push(BlockRun { block, length: 1 });
        if after > 0 {
            replacement.push(BlockRun {
                block: run.block,
                length: after,
            });
        }
        self.runs.splice(run_index..=run_index, replacement);
        self.coalesce();
        self.rebuild_ends();
        Ok(())
    }

    /// Merges adjacent runs holding the same block.
    fn coalesce(&mut self) {
        let mut merged: Vec<BlockRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            match merged.last_mut() {
                Some(last) if last.block == run.block => last.length += run.length,
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }

    /// Expands the runs into a flat block array in iteration order.
    pub fn decode(&self) -> Vec<BlockId> {
        // Lengths always sum to the volume, so decoding cannot mismatch.
        rle_decode(&self.runs, self.extent.volume()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds [`ChunkData`] by appending cells in iteration order.
#[derive(Debug)]
pub struct ChunkDataBuilder {
    extent: ChunkExtent,
    encoder: RunEncoder,
}

impl ChunkDataBuilder {
    /// Starts an empty builder for `extent`.
    pub fn new(extent: ChunkExtent) -> Self {
        Self {
            extent,
            encoder: RunEncoder::new(),
        }
    }

    /// Appends the next cell.
    pub fn push(&mut self, block: BlockId) {
        self.encoder.push(block);
    }

    /// Cells appended so far.
    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    /// Returns `true` if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }

    /// Finishes the chunk. Fails unless exactly one block per cell was appended.
    pub fn finish(self) -> Result<ChunkData, RleError> {
        if self.encoder.len() != self.extent.volume() {
            return Err(RleError::LengthMismatch {
                expected: self.extent.volume(),
                actual: self.encoder.len(),
            });
        }
        Ok(ChunkData::from_canonical(self.extent, self.encoder.finish()))
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// Immutable pairing of a coordinate and its block data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    coordinate: ChunkCoordinate,
    data: ChunkData,
}

impl Chunk {
    /// Pairs `data` with `coordinate`.
    pub fn new(coordinate: ChunkCoordinate, data: ChunkData) -> Self {
        Self { coordinate, data }
    }

    /// Chunk coordinate.
    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    /// Block data.
    pub fn data(&self) -> &ChunkData {
        &self.data
    }

    /// Consumes the chunk, returning its data.
    pub fn into_data(self) -> ChunkData {
        self.data
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const STONE: BlockId = BlockId(1);
    const WATER: BlockId = BlockId(5);

    fn extent() -> ChunkExtent {
        ChunkExtent::new(4, 3, 2)
    }

    fn terrain_like() -> ChunkData {
        // Bottom layer stone, middle layer water, top layer air.
        let e = extent();
        let mut builder = ChunkDataBuilder::new(e);
        for _z in 0..e.z {
            for y in 0..e.y {
                for _x in 0..e.x {
                    builder.push(match y {
                        0 => STONE,
                        1 => WATER,
                        _ => BlockId::AIR,
                    });
                }
            }
        }
        builder.finish().expect("complete chunk")
    }

    #[test]
    fn test_linear_index_x_fastest() {
        let e = extent();
        assert_eq!(e.linear_index(0, 0, 0), 0);
        assert_eq!(e.linear_index(1, 0, 0), 1);
        assert_eq!(e.linear_index(0, 1, 0), 4);
        assert_eq!(e.linear_index(0, 0, 1), 12);
        assert_eq!(e.linear_index(3, 2, 1), e.volume() - 1);
    }

    #[test]
    fn test_run_lengths_sum_to_volume() {
        let data = terrain_like();
        let total: u32 = data.runs().iter().map(|r| r.length).sum();
        assert_eq!(total as usize, extent().volume());
        // Rows alternate per z slice: stone, water, air, stone, water, air.
        assert_eq!(data.run_count(), 6);
    }

    #[test]
    fn test_point_lookup() {
        let data = terrain_like();
        assert_eq!(data.get(2, 0, 1), STONE);
        assert_eq!(data.get(0, 1, 0), WATER);
        assert_eq!(data.get(3, 2, 1), BlockId::AIR);
        assert_eq!(data.try_get(IVec3::new(4, 0, 0)), None);
        assert_eq!(data.try_get(IVec3::new(-1, 0, 0)), None);
    }

    #[test]
    fn test_set_splits_and_merges_runs() {
        let mut data = ChunkData::empty(extent());
        assert_eq!(data.run_count(), 1);

        data.set(IVec3::new(1, 1, 0), STONE).expect("in bounds");
        assert_eq!(data.run_count(), 3);
        assert_eq!(data.get(1, 1, 0), STONE);
        assert_eq!(data.get(0, 1, 0), BlockId::AIR);

        // Restoring the cell merges the three runs back into one.
        data.set(IVec3::new(1, 1, 0), BlockId::AIR).expect("in bounds");
        assert_eq!(data.run_count(), 1);
        assert_eq!(data.uniform_block(), Some(BlockId::AIR));
    }

    #[test]
    fn test_set_at_run_edges() {
        let mut data = ChunkData::empty(extent());
        data.set(IVec3::new(0, 0, 0), STONE).expect("first cell");
        data.set(IVec3::new(3, 2, 1), STONE).expect("last cell");
        assert_eq!(data.run_count(), 3);
        data.set(IVec3::new(1, 0, 0), STONE).expect("extend first run");
        assert_eq!(data.run_count(), 3);
        assert_eq!(data.runs()[0].length, 2);
    }

    #[test]
    fn test_set_out_of_bounds_errors() {
        let mut data = ChunkData::empty(extent());
        assert!(matches!(
            data.set(IVec3::new(0, 3, 0), STONE),
            Err(ChunkDataError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_decode_recompress_roundtrip() {
        let mut data = terrain_like();
        data.set(IVec3::new(2, 2, 0), STONE).expect("in bounds");
        let recompressed = ChunkData::from_blocks(extent(), &data.decode()).expect("same volume");
        assert_eq!(recompressed.runs(), data.runs());
        assert_eq!(recompressed, data);
    }

    #[test]
    fn test_from_runs_canonicalizes() {
        let runs = [
            BlockRun {
                block: STONE,
                length: 10,
            },
            BlockRun {
                block: STONE,
                length: 0,
            },
            BlockRun {
                block: STONE,
                length: 14,
            },
        ];
        let data = ChunkData::from_runs(extent(), &runs).expect("24 cells");
        assert_eq!(data.uniform_block(), Some(STONE));
        assert!(ChunkData::from_runs(extent(), &runs[..1]).is_err());
    }

    #[test]
    fn test_builder_rejects_short_input() {
        let mut builder = ChunkDataBuilder::new(extent());
        builder.push(STONE);
        assert!(matches!(
            builder.finish(),
            Err(RleError::LengthMismatch {
                expected: 24,
                actual: 1
            })
        ));
    }
}
