//! Greedy meshing: sweeps each axis slice by slice, builds a face mask for
//! the slice plane and merges equal mask entries into maximal rectangles.
//!
//! A face exists wherever two adjacent cells belong to different mesh groups
//! and is owned by the cell with the higher group (opaque over translucent
//! over empty). Faces on the chunk boundary are emitted only when the owning
//! cell lies inside the chunk, so every shared face is meshed exactly once.

use std::sync::Arc;

use glam::IVec3;
use strata_voxel::{BlockClassifier, BlockId, ChunkAccessor, ChunkCoordinate, MeshGroup};
use tracing::trace;

use crate::ambient_occlusion::face_ao;
use crate::atlas::{AtlasLookup, PlainVertices, VertexDecorator};
use crate::face_direction::FaceDirection;
use crate::mesh_buffer::{MeshBuffer, Quad};

/// Errors raised while meshing a chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// The accessor does not hold a chunk the mesher needs.
    #[error("meshing {meshing}: chunk {coordinate} is missing from the accessor")]
    MissingChunk {
        /// Chunk being meshed.
        meshing: ChunkCoordinate,
        /// Chunk that could not be found.
        coordinate: ChunkCoordinate,
    },
}

/// One mask entry: the visible block, which side it faces and its corner AO.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FaceMask {
    block: BlockId,
    positive: bool,
    ao: [u8; 4],
}

/// Blocks of a chunk plus a one-cell border taken from its neighbours.
struct PaddedVolume {
    size: IVec3,
    blocks: Vec<BlockId>,
    groups: Vec<MeshGroup>,
    opaque: Vec<bool>,
}

impl PaddedVolume {
    /// Index of local position `p`, valid for `-1..=extent` on every axis.
    fn index(&self, p: IVec3) -> usize {
        let q = p + IVec3::ONE;
        (q.x + q.y * self.size.x + q.z * self.size.x * self.size.y) as usize
    }

    fn block(&self, p: IVec3) -> BlockId {
        self.blocks[self.index(p)]
    }

    fn group(&self, p: IVec3) -> MeshGroup {
        self.groups[self.index(p)]
    }

    fn is_opaque(&self, p: IVec3) -> bool {
        self.opaque[self.index(p)]
    }
}

/// Stateless greedy mesher. Safe to share across worker threads.
#[derive(Clone)]
pub struct GreedyMesher {
    classifier: Arc<dyn BlockClassifier>,
    atlas: Arc<dyn AtlasLookup>,
    decorator: Arc<dyn VertexDecorator>,
}

impl GreedyMesher {
    /// Mesher with chunk-local vertex positions.
    pub fn new(classifier: Arc<dyn BlockClassifier>, atlas: Arc<dyn AtlasLookup>) -> Self {
        Self {
            classifier,
            atlas,
            decorator: Arc::new(PlainVertices),
        }
    }

    /// Replaces the vertex decorator.
    pub fn with_decorator(mut self, decorator: Arc<dyn VertexDecorator>) -> Self {
        self.decorator = decorator;
        self
    }

    /// Meshes `coord` into a fresh buffer pre-sized for the accessor's extent.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingChunk`] if the accessor lacks `coord` or any of its
    /// 26 neighbours.
    pub fn mesh(&self, accessor: &ChunkAccessor, coord: ChunkCoordinate) -> Result<MeshBuffer, MeshError> {
        let mut out = MeshBuffer::for_extent(accessor.extent());
        self.mesh_into(accessor, coord, &mut out)?;
        Ok(out)
    }

    /// Meshes `coord` into `out`, replacing its contents and reusing its
    /// allocations.
    pub fn mesh_into(
        &self,
        accessor: &ChunkAccessor,
        coord: ChunkCoordinate,
        out: &mut MeshBuffer,
    ) -> Result<(), MeshError> {
        out.clear();
        let volume = self.sample(accessor, coord)?;
        let extent = accessor.extent().as_ivec3();
        let mut mask: Vec<Option<FaceMask>> = Vec::new();

        for axis in 0..3 {
            let (u_axis, v_axis) = FaceDirection::from_axis(axis, true).tangent_axes();
            let plane = (extent[u_axis] * extent[v_axis]) as usize;
            mask.clear();
            mask.resize(plane, None);

            for slice in -1..extent[axis] {
                self.fill_mask(&volume, extent, axis, slice, &mut mask);
                self.merge_mask(coord, extent, axis, slice, &mut mask, out);
            }
        }

        trace!(
            %coord,
            quads = out.quad_count(),
            vertices = out.vertices.len(),
            "meshed chunk"
        );
        Ok(())
    }

    /// Copies the chunk and its one-cell border out of the accessor.
    fn sample(&self, accessor: &ChunkAccessor, coord: ChunkCoordinate) -> Result<PaddedVolume, MeshError> {
        let extent = accessor.extent();
        let center = accessor.chunk(coord).ok_or(MeshError::MissingChunk {
            meshing: coord,
            coordinate: coord,
        })?;
        let interior = center.data().decode();
        let ext = extent.as_ivec3();
        let size = ext + IVec3::splat(2);

        let mut blocks = Vec::with_capacity((size.x * size.y * size.z) as usize);
        for z in -1..=ext.z {
            for y in -1..=ext.y {
                for x in -1..=ext.x {
                    let local = IVec3::new(x, y, z);
                    let block = if extent.contains(local) {
                        interior[extent.linear_index(x as u32, y as u32, z as u32)]
                    } else {
                        accessor
                            .block(coord, local)
                            .ok_or_else(|| MeshError::MissingChunk {
                                meshing: coord,
                                coordinate: accessor.resolve(coord, local).0,
                            })?
                    };
                    blocks.push(block);
                }
            }
        }

        let groups = blocks.iter().map(|b| self.classifier.mesh_group(*b)).collect();
        let opaque = blocks.iter().map(|b| self.classifier.is_opaque(*b)).collect();
        Ok(PaddedVolume {
            size,
            blocks,
            groups,
            opaque,
        })
    }

    /// Fills the mask for the boundary between cells `slice` and `slice + 1`.
    fn fill_mask(
        &self,
        volume: &PaddedVolume,
        extent: IVec3,
        axis: usize,
        slice: i32,
        mask: &mut [Option<FaceMask>],
    ) {
        let (u_axis, v_axis) = FaceDirection::from_axis(axis, true).tangent_axes();
        let step = IVec3::AXES[axis];
        let width = extent[u_axis];

        for j in 0..extent[v_axis] {
            for i in 0..width {
                let mut a = IVec3::ZERO;
                a[axis] = slice;
                a[u_axis] = i;
                a[v_axis] = j;
                let b = a + step;

                let (group_a, group_b) = (volume.group(a), volume.group(b));
                let entry = if group_a == group_b {
                    None
                } else {
                    let positive = group_a > group_b;
                    let owned = if positive {
                        slice >= 0
                    } else {
                        slice < extent[axis] - 1
                    };
                    owned.then(|| {
                        let (solid, front) = if positive { (a, b) } else { (b, a) };
                        let direction = FaceDirection::from_axis(axis, positive);
                        FaceMask {
                            block: volume.block(solid),
                            positive,
                            ao: face_ao(direction, front, |p| volume.is_opaque(p)),
                        }
                    })
                };
                mask[(j * width + i) as usize] = entry;
            }
        }
    }

    /// Merges the mask into rectangles and emits one quad per rectangle,
    /// clearing consumed entries.
    fn merge_mask(
        &self,
        coord: ChunkCoordinate,
        extent: IVec3,
        axis: usize,
        slice: i32,
        mask: &mut [Option<FaceMask>],
        out: &mut MeshBuffer,
    ) {
        let (u_axis, v_axis) = FaceDirection::from_axis(axis, true).tangent_axes();
        let (size_u, size_v) = (extent[u_axis], extent[v_axis]);

        for j in 0..size_v {
            let mut i = 0;
            while i < size_u {
                let start = (j * size_u + i) as usize;
                let Some(face) = mask[start] else {
                    i += 1;
                    continue;
                };

                let mut width = 1;
                while i + width < size_u && mask[start + width as usize] == Some(face) {
                    width += 1;
                }

                let mut height = 1;
                'grow: while j + height < size_v {
                    let row = ((j + height) * size_u + i) as usize;
                    for cell in &mask[row..row + width as usize] {
                        if *cell != Some(face) {
                            break 'grow;
                        }
                    }
                    height += 1;
                }

                for dv in 0..height {
                    let row = ((j + dv) * size_u + i) as usize;
                    mask[row..row + width as usize].fill(None);
                }

                self.emit(
                    coord,
                    axis,
                    slice + 1,
                    (i as u32, j as u32),
                    (width as u32, height as u32),
                    face,
                    out,
                );
                i += width;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        coord: ChunkCoordinate,
        axis: usize,
        layer: i32,
        (u, v): (u32, u32),
        (width, height): (u32, u32),
        face: FaceMask,
        out: &mut MeshBuffer,
    ) {
        let direction = FaceDirection::from_axis(axis, face.positive);
        let translucent = self.classifier.mesh_group(face.block) == MeshGroup::Translucent;
        let quad = Quad {
            direction,
            layer,
            u,
            v,
            width,
            height,
            block: face.block,
            ao: face.ao,
            tile: self.atlas.atlas_index(face.block, direction),
            translucent,
        };

        let range = out.push_quad(&quad, false);
        self.decorator
            .decorate(coord, face.block, &mut out.vertices[range]);

        // Liquid surfaces are visible from below without disabling culling.
        if translucent && direction == FaceDirection::PosY {
            let range = out.push_quad(&quad, true);
            self.decorator
                .decorate(coord, face.block, &mut out.vertices[range]);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
