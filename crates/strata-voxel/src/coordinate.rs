//! Chunk coordinates: the world-space block position of a chunk's minimum
//! corner, always a multiple of the chunk extent.

use std::fmt;

use glam::IVec3;

use crate::chunk::ChunkExtent;

/// Identifies a chunk by the world block coordinate of its minimum corner.
///
/// Every map in the streaming core is keyed by this type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoordinate {
    /// World block X of the chunk origin.
    pub x: i32,
    /// World block Y of the chunk origin.
    pub y: i32,
    /// World block Z of the chunk origin.
    pub z: i32,
}

impl ChunkCoordinate {
    /// Creates a coordinate from a chunk origin. The caller guarantees alignment.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk containing world block `world`.
    pub fn containing(world: IVec3, extent: ChunkExtent) -> Self {
        let e = extent.as_ivec3();
        Self::from_origin(world.div_euclid(e) * e)
    }

    /// The chunk at integer grid position `grid` (chunk units).
    pub fn from_grid(grid: IVec3, extent: ChunkExtent) -> Self {
        Self::from_origin(grid * extent.as_ivec3())
    }

    fn from_origin(origin: IVec3) -> Self {
        Self::new(origin.x, origin.y, origin.z)
    }

    /// Grid position in chunk units.
    pub fn grid(self, extent: ChunkExtent) -> IVec3 {
        self.origin().div_euclid(extent.as_ivec3())
    }

    /// World block position of the chunk's minimum corner.
    pub fn origin(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    /// Whether this coordinate is a multiple of `extent`.
    pub fn is_aligned(self, extent: ChunkExtent) -> bool {
        self.origin().rem_euclid(extent.as_ivec3()) == IVec3::ZERO
    }

    /// The chunk `(dx, dy, dz)` chunks away.
    pub fn offset_chunks(self, dx: i32, dy: i32, dz: i32, extent: ChunkExtent) -> Self {
        Self::from_origin(self.origin() + IVec3::new(dx, dy, dz) * extent.as_ivec3())
    }

    /// The 26 chunks sharing a face, edge or corner with this one.
    pub fn neighbors(self, extent: ChunkExtent) -> impl Iterator<Item = ChunkCoordinate> {
        self.neighborhood(extent).filter(move |c| *c != self)
    }

    /// This chunk and its 26 neighbours (the 3×3×3 block centred on it).
    pub fn neighborhood(self, extent: ChunkExtent) -> impl Iterator<Item = ChunkCoordinate> {
        (-1..=1).flat_map(move |dz| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).map(move |dx| self.offset_chunks(dx, dy, dz, extent))
            })
        })
    }

    /// Squared Euclidean distance between chunk origins, in blocks.
    ///
    /// This is the priority key for store eviction and pool reclamation.
    pub fn distance_sq(self, other: ChunkCoordinate) -> u64 {
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dy = (self.y as i64 - other.y as i64).unsigned_abs();
        let dz = (self.z as i64 - other.z as i64).unsigned_abs();
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for ChunkCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<IVec3> for ChunkCoordinate {
    fn from(origin: IVec3) -> Self {
        Self::from_origin(origin)
    }
}
