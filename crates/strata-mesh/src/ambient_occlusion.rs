//! Per-vertex voxel ambient occlusion.
//!
//! Each face corner looks at three cells in the plane directly in front of the
//! face: the two cells sharing an edge with the corner and the one diagonal
//! cell. Values run from 0 (darkest) to 3 (fully exposed).

use glam::IVec3;

use crate::face_direction::FaceDirection;

/// Corner order shared by AO tuples and quad vertices, as `(du, dv)` signs
/// along the face's tangent axes: `(u0,v0)`, `(u1,v0)`, `(u0,v1)`, `(u1,v1)`.
pub const AO_CORNERS: [(i32, i32); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

/// AO value of one corner from its two edge neighbours and diagonal neighbour.
///
/// Both edges occluded gives 0 regardless of the diagonal.
pub fn vertex_ao(side1: bool, side2: bool, corner: bool) -> u8 {
    if side1 && side2 {
        0
    } else {
        3 - (side1 as u8 + side2 as u8 + corner as u8)
    }
}

/// Whether a quad should be split along its `1–2` diagonal instead of `0–3`.
///
/// Flips when the `0–3` pair is brighter, so the edge shared by the two
/// triangles always joins the darker pair of corners.
pub fn should_flip_ao_diagonal(ao: [u8; 4]) -> bool {
    ao[0] + ao[3] > ao[1] + ao[2]
}

/// Sample offsets `(side1, side2, corner)` for each of the four corners of a
/// face, relative to the cell in front of it.
pub fn corner_ao_samples(direction: FaceDirection) -> [[IVec3; 3]; 4] {
    let (u_axis, v_axis) = direction.tangent_axes();
    let u = IVec3::AXES[u_axis];
    let v = IVec3::AXES[v_axis];
    AO_CORNERS.map(|(du, dv)| [u * du, v * dv, u * du + v * dv])
}

/// AO tuple for a face whose front cell is `front`, given an occlusion test.
pub(crate) fn face_ao(
    direction: FaceDirection,
    front: IVec3,
    mut occluded: impl FnMut(IVec3) -> bool,
) -> [u8; 4] {
    corner_ao_samples(direction).map(|[s1, s2, c]| {
        vertex_ao(occluded(front + s1), occluded(front + s2), occluded(front + c))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposed_vertex_is_brightest() {
        assert_eq!(vertex_ao(false, false, false), 3);
    }

    #[test]
    fn test_both_sides_occluded_is_zero_regardless_of_corner() {
        assert_eq!(vertex_ao(true, true, false), 0);
        assert_eq!(vertex_ao(true, true, true), 0);
    }

    #[test]
    fn test_partial_occlusion() {
        assert_eq!(vertex_ao(true, false, false), 2);
        assert_eq!(vertex_ao(false, false, true), 2);
        assert_eq!(vertex_ao(false, true, true), 1);
    }

    #[test]
    fn test_ao_always_in_range() {
        for bits in 0..8u8 {
            let ao = vertex_ao(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
            assert!(ao <= 3);
            assert_eq!(ao == 0, bits & 3 == 3, "zero only when both edges occluded");
        }
    }

    #[test]
    fn test_flip_follows_larger_diagonal_sum() {
        assert!(!should_flip_ao_diagonal([3, 3, 3, 3]));
        assert!(should_flip_ao_diagonal([3, 1, 2, 3]));
        assert!(!should_flip_ao_diagonal([1, 3, 3, 2]));
    }

    #[test]
    fn test_samples_lie_in_face_plane() {
        for direction in FaceDirection::ALL {
            let axis = direction.axis();
            for samples in corner_ao_samples(direction) {
                for offset in samples {
                    assert_eq!(offset[axis], 0, "{direction:?}");
                }
            }
        }
    }

    #[test]
    fn test_face_ao_with_single_edge_neighbor() {
        // Top face; the +u edge neighbour (z+1 for PosY) darkens corners 1 and 3.
        let ao = face_ao(FaceDirection::PosY, IVec3::new(0, 1, 0), |p| {
            p == IVec3::new(0, 1, 1)
        });
        assert_eq!(ao, [3, 2, 3, 2]);
    }
}
