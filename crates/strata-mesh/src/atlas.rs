//! Strategies injected into the mesher: atlas tile lookup and per-vertex
//! decoration.

use strata_voxel::{BlockId, BlockRegistry, ChunkCoordinate};

use crate::face_direction::FaceDirection;
use crate::mesh_buffer::MeshVertex;

/// Resolves the atlas tile for a block face.
pub trait AtlasLookup: Send + Sync {
    /// Atlas tile index for `block` seen from `face`.
    fn atlas_index(&self, block: BlockId, face: FaceDirection) -> u32;
}

/// Adjusts the vertices of one emitted quad after the mesher has written them.
pub trait VertexDecorator: Send + Sync {
    /// Called once per quad with its freshly written vertices.
    fn decorate(&self, chunk: ChunkCoordinate, block: BlockId, vertices: &mut [MeshVertex]);
}

/// Leaves vertices untouched; positions stay chunk-local.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainVertices;

impl VertexDecorator for PlainVertices {
    fn decorate(&self, _chunk: ChunkCoordinate, _block: BlockId, _vertices: &mut [MeshVertex]) {}
}

/// Offsets positions by the chunk origin, for consumers that draw every
/// chunk without a per-object transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorldSpaceVertices;

impl VertexDecorator for WorldSpaceVertices {
    fn decorate(&self, chunk: ChunkCoordinate, _block: BlockId, vertices: &mut [MeshVertex]) {
        let origin = chunk.origin().as_vec3().to_array();
        for vertex in vertices {
            for (p, o) in vertex.position.iter_mut().zip(origin) {
                *p += o;
            }
        }
    }
}

impl AtlasLookup for BlockRegistry {
    fn atlas_index(&self, block: BlockId, face: FaceDirection) -> u32 {
        let Some(def) = self.get(block) else {
            return 0;
        };
        let tile = match face {
            FaceDirection::PosY => def.top_material_index.unwrap_or(def.material_index),
            _ => def.material_index,
        };
        u32::from(tile)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
