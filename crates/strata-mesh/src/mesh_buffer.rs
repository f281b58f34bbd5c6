//! Vertex and index buffers produced by the mesher.

use std::ops::Range;

use strata_voxel::{BlockId, ChunkExtent};

use crate::ambient_occlusion::should_flip_ao_diagonal;
use crate::face_direction::FaceDirection;

/// One mesh vertex, laid out for direct GPU upload.
///
/// Layout (40 bytes): position, normal, tiled uv, atlas tile index, and the
/// baked AO factor in `[0, 1]` (1 = fully exposed).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    /// Position in chunk-local block units.
    pub position: [f32; 3],
    /// Face normal.
    pub normal: [f32; 3],
    /// Texture coordinates, spanning `0..width` and `0..height` so textures
    /// repeat once per block across merged quads.
    pub uv: [f32; 2],
    /// Atlas tile returned by the atlas lookup.
    pub tile: u32,
    /// AO corner value divided by 3.
    pub ao: f32,
}

static_assertions::assert_eq_size!(MeshVertex, [u8; 40]);

/// A merged rectangle ready for emission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quad {
    /// Facing direction.
    pub direction: FaceDirection,
    /// Plane coordinate along the normal axis.
    pub layer: i32,
    /// Minimum corner along the first tangent axis.
    pub u: u32,
    /// Minimum corner along the second tangent axis.
    pub v: u32,
    /// Extent along the first tangent axis.
    pub width: u32,
    /// Extent along the second tangent axis.
    pub height: u32,
    /// Visible block.
    pub block: BlockId,
    /// AO of corners `(u0,v0)`, `(u1,v0)`, `(u0,v1)`, `(u1,v1)`.
    pub ao: [u8; 4],
    /// Atlas tile for `block` seen from `direction`.
    pub tile: u32,
    /// Whether the quad goes into the translucent index list.
    pub translucent: bool,
}

/// Metadata for one emitted quad, for statistics and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuadInfo {
    /// Direction of the originating face.
    pub direction: FaceDirection,
    /// Plane coordinate along the normal axis.
    pub layer: i32,
    /// Merged width.
    pub width: u32,
    /// Merged height.
    pub height: u32,
    /// Visible block.
    pub block: BlockId,
    /// Corner AO tuple.
    pub ao: [u8; 4],
    /// Emitted into the translucent list.
    pub translucent: bool,
    /// Back side of a double-sided face (inverted normal, reversed winding).
    pub mirrored: bool,
}

/// Per-chunk mesh output: one vertex list shared by an opaque and a
/// translucent index list.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffer {
    /// Vertex buffer.
    pub vertices: Vec<MeshVertex>,
    /// Triangle indices for opaque geometry.
    pub opaque_indices: Vec<u32>,
    /// Triangle indices for translucent geometry.
    pub translucent_indices: Vec<u32>,
    /// One entry per emitted quad.
    pub quads: Vec<QuadInfo>,
}

impl MeshBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `quads` quads.
    pub fn with_capacity(quads: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(quads * 4),
            opaque_indices: Vec::with_capacity(quads * 6),
            translucent_indices: Vec::new(),
            quads: Vec::with_capacity(quads),
        }
    }

    /// Creates an empty buffer sized for a typical chunk of `extent`: one
    /// quad per cell of the chunk's six outer faces.
    pub fn for_extent(extent: ChunkExtent) -> Self {
        let [x, y, z] = [0, 1, 2].map(|axis| extent.axis(axis) as usize);
        Self::with_capacity(2 * (x * y + y * z + x * z))
    }

    /// Empties every list, keeping allocations.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.opaque_indices.clear();
        self.translucent_indices.clear();
        self.quads.clear();
    }

    /// Appends a quad's four vertices and six indices, returning the range of
    /// the new vertices.
    ///
    /// A `mirrored` quad shares the positions of `quad` but faces the other
    /// way: its normal is negated and its winding reversed.
    pub fn push_quad(&mut self, quad: &Quad, mirrored: bool) -> Range<usize> {
        let axis = quad.direction.axis();
        let (u_axis, v_axis) = quad.direction.tangent_axes();
        let mut normal = quad.direction.normal();
        if mirrored {
            normal = normal.map(|n| -n);
        }

        let (w, h) = (quad.width as f32, quad.height as f32);
        let (u0, v0) = (quad.u as f32, quad.v as f32);
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];

        let start = self.vertices.len();
        for (i, (du, dv)) in corners.into_iter().enumerate() {
            let mut position = [0.0_f32; 3];
            position[axis] = quad.layer as f32;
            position[u_axis] = u0 + du;
            position[v_axis] = v0 + dv;
            self.vertices.push(MeshVertex {
                position,
                normal,
                uv: [du, dv],
                tile: quad.tile,
                ao: f32::from(quad.ao[i]) / 3.0,
            });
        }

        let front_positive = quad.direction.is_positive() != mirrored;
        let indices = quad_indices(start as u32, front_positive, should_flip_ao_diagonal(quad.ao));
        if quad.translucent {
            self.translucent_indices.extend_from_slice(&indices);
        } else {
            self.opaque_indices.extend_from_slice(&indices);
        }

        self.quads.push(QuadInfo {
            direction: quad.direction,
            layer: quad.layer,
            width: quad.width,
            height: quad.height,
            block: quad.block,
            ao: quad.ao,
            translucent: quad.translucent,
            mirrored,
        });
        start..self.vertices.len()
    }

    /// Number of emitted quads.
    pub fn quad_count(&self) -> usize {
        self.quads.len()
    }

    /// Number of quads emitted for `direction`, mirrored copies included.
    pub fn count_quads_for_direction(&self, direction: FaceDirection) -> usize {
        self.quads.iter().filter(|q| q.direction == direction).count()
    }

    /// Number of triangles across both index lists.
    pub fn triangle_count(&self) -> usize {
        (self.opaque_indices.len() + self.translucent_indices.len()) / 3
    }

    /// Returns `true` if no geometry was produced.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex data as raw bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Opaque index data as raw bytes.
    pub fn opaque_index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.opaque_indices)
    }

    /// Translucent index data as raw bytes.
    pub fn translucent_index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.translucent_indices)
    }
}

/// Two triangles over corners `0=(u0,v0) 1=(u1,v0) 2=(u0,v1) 3=(u1,v1)`,
/// counter-clockwise when seen from the side the face points to.
fn quad_indices(base: u32, positive: bool, flip: bool) -> [u32; 6] {
    let local: [u32; 6] = match (positive, flip) {
        (true, false) => [0, 1, 3, 0, 3, 2],
        (true, true) => [0, 1, 2, 1, 3, 2],
        (false, false) => [0, 3, 1, 0, 2, 3],
        (false, true) => [0, 2, 1, 1, 2, 3],
    };
    local.map(|i| base + i)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn quad(direction: FaceDirection, ao: [u8; 4], translucent: bool) -> Quad {
        Quad {
            direction,
            layer: 1,
            u: 2,
            v: 3,
            width: 4,
            height: 2,
            block: BlockId(1),
            ao,
            tile: 7,
            translucent,
        }
    }

    fn triangle_normals(mesh: &MeshBuffer, indices: &[u32]) -> Vec<Vec3> {
        indices
            .chunks_exact(3)
            .map(|tri| {
                let p = |i: u32| Vec3::from(mesh.vertices[i as usize].position);
                (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
            })
            .collect()
    }

    #[test]
    fn test_winding_faces_outward_for_every_direction() {
        for direction in FaceDirection::ALL {
            for ao in [[3, 3, 3, 3], [3, 0, 1, 3]] {
                let mut mesh = MeshBuffer::new();
                mesh.push_quad(&quad(direction, ao, false), false);
                let normal = Vec3::from(direction.normal());
                for n in triangle_normals(&mesh, &mesh.opaque_indices) {
                    assert!(n.dot(normal) > 0.0, "{direction:?} ao={ao:?}");
                }
            }
        }
    }

    #[test]
    fn test_mirrored_quad_faces_the_other_way() {
        let mut mesh = MeshBuffer::new();
        let q = quad(FaceDirection::PosY, [3, 3, 3, 3], true);
        mesh.push_quad(&q, false);
        let range = mesh.push_quad(&q, true);
        assert_eq!(range, 4..8);
        assert_eq!(mesh.vertices[4].normal, [0.0, -1.0, 0.0]);
        assert_eq!(mesh.vertices[0].position, mesh.vertices[4].position);

        let normals = triangle_normals(&mesh, &mesh.translucent_indices[6..]);
        for n in normals {
            assert!(n.y < 0.0);
        }
        assert!(mesh.quads[1].mirrored);
    }

    #[test]
    fn test_flip_uses_other_diagonal() {
        let mut mesh = MeshBuffer::new();
        mesh.push_quad(&quad(FaceDirection::PosX, [3, 3, 3, 3], false), false);
        mesh.push_quad(&quad(FaceDirection::PosX, [3, 0, 0, 3], false), false);
        // Unflipped triangles share the 0–3 edge, flipped ones the 1–2 edge.
        assert_eq!(&mesh.opaque_indices[..6], &[0, 1, 3, 0, 3, 2]);
        assert_eq!(&mesh.opaque_indices[6..], &[4, 5, 6, 5, 7, 6]);
    }

    #[test]
    fn test_split_edge_joins_darker_corners() {
        for direction in FaceDirection::ALL {
            for ao in [[3, 1, 1, 3], [1, 3, 3, 1], [2, 2, 2, 2], [0, 3, 2, 3], [3, 0, 3, 3]] {
                let mut mesh = MeshBuffer::new();
                mesh.push_quad(&quad(direction, ao, false), false);
                let first = &mesh.opaque_indices[..3];
                let shared: Vec<u32> = mesh.opaque_indices[3..]
                    .iter()
                    .copied()
                    .filter(|i| first.contains(i))
                    .collect();
                assert_eq!(shared.len(), 2, "{direction:?} {ao:?}");
                let on_edge: u32 = shared.iter().map(|&i| ao[i as usize] as u32).sum();
                let off_edge: u32 = ao.iter().map(|&a| a as u32).sum::<u32>() - on_edge;
                assert!(
                    on_edge <= off_edge,
                    "{direction:?} {ao:?}: split edge joins the brighter corners"
                );
            }
        }
    }

    #[test]
    fn test_for_extent_presizes_every_list() {
        let mesh = MeshBuffer::for_extent(ChunkExtent::cube(4));
        assert!(mesh.is_empty());
        assert!(mesh.quads.capacity() >= 96);
        assert!(mesh.vertices.capacity() >= 96 * 4);
        assert!(mesh.opaque_indices.capacity() >= 96 * 6);
    }

    #[test]
    fn test_uv_spans_quad_size_and_ao_is_normalized() {
        let mut mesh = MeshBuffer::new();
        mesh.push_quad(&quad(FaceDirection::NegZ, [0, 1, 2, 3], false), false);
        assert_eq!(mesh.vertices[3].uv, [4.0, 2.0]);
        assert_eq!(mesh.vertices[0].ao, 0.0);
        assert_eq!(mesh.vertices[3].ao, 1.0);
        assert!(mesh.vertices.iter().all(|v| v.tile == 7));
        // Plane at z=1, spanning x in 2..6 and y in 3..5 (u=x, v=y for Z faces).
        assert_eq!(mesh.vertices[3].position, [6.0, 5.0, 1.0]);
    }

    #[test]
    fn test_index_lists_are_split_by_translucency() {
        let mut mesh = MeshBuffer::with_capacity(4);
        mesh.push_quad(&quad(FaceDirection::PosX, [3; 4], false), false);
        mesh.push_quad(&quad(FaceDirection::PosY, [3; 4], true), false);
        assert_eq!(mesh.opaque_indices.len(), 6);
        assert_eq!(mesh.translucent_indices.len(), 6);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.count_quads_for_direction(FaceDirection::PosY), 1);
        assert_eq!(mesh.vertex_bytes().len(), 8 * 40);

        mesh.clear();
        assert!(mesh.is_empty());
        assert_eq!(mesh.quad_count(), 0);
    }
}
