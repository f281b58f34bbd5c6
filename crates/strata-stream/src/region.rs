//! Claim/reclaim sets for a cubic region that follows the focus.
//!
//! A region of radius `r` around focus chunk `f` is every chunk whose grid
//! position lies within `r` of `f` on each axis. When the focus moves, only
//! the slabs entered and vacated along each changed axis are visited; slabs
//! of different axes overlap at edges and corners, and collecting into sets
//! removes the duplicates.

use std::ops::RangeInclusive;

use glam::IVec3;
use rustc_hash::FxHashSet;
use strata_voxel::{ChunkCoordinate, ChunkExtent};

/// Coordinates entering and leaving a region.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegionDiff {
    /// Inside the new region, not the old one.
    pub claims: FxHashSet<ChunkCoordinate>,
    /// Inside the old region, not the new one.
    pub reclaims: FxHashSet<ChunkCoordinate>,
}

impl RegionDiff {
    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty() && self.reclaims.is_empty()
    }
}

/// Whether `coord` lies in the region of `radius` around `center`.
pub fn region_contains(
    center: ChunkCoordinate,
    radius: u32,
    coord: ChunkCoordinate,
    extent: ChunkExtent,
) -> bool {
    let delta = (coord.grid(extent) - center.grid(extent)).abs();
    delta.max_element() <= radius as i32
}

/// Every coordinate of the region of `radius` around `center`.
pub fn region_coordinates(
    center: ChunkCoordinate,
    radius: u32,
    extent: ChunkExtent,
) -> FxHashSet<ChunkCoordinate> {
    let grid = center.grid(extent);
    let r = radius as i32;
    let mut out = FxHashSet::default();
    collect_box(
        [grid.x - r..=grid.x + r, grid.y - r..=grid.y + r, grid.z - r..=grid.z + r],
        extent,
        &mut out,
    );
    out
}

/// Claim and reclaim sets for moving the focus from `previous` to `current`.
///
/// `None` for `previous` means the region has never been populated: the
/// whole new region is claimed.
pub fn region_diff(
    previous: Option<ChunkCoordinate>,
    current: ChunkCoordinate,
    radius: u32,
    extent: ChunkExtent,
) -> RegionDiff {
    let Some(previous) = previous else {
        return RegionDiff {
            claims: region_coordinates(current, radius, extent),
            reclaims: FxHashSet::default(),
        };
    };

    let r = radius as i32;
    let old = previous.grid(extent);
    let new = current.grid(extent);
    let mut diff = RegionDiff::default();

    for axis in 0..3 {
        let delta = new[axis] - old[axis];
        if delta == 0 {
            continue;
        }
        let (entered, vacated) = if delta > 0 {
            (
                (old[axis] + r + 1).max(new[axis] - r)..=new[axis] + r,
                old[axis] - r..=(new[axis] - r - 1).min(old[axis] + r),
            )
        } else {
            (
                new[axis] - r..=(old[axis] - r - 1).min(new[axis] + r),
                (new[axis] + r + 1).max(old[axis] - r)..=old[axis] + r,
            )
        };
        collect_box(slab(new, r, axis, entered), extent, &mut diff.claims);
        collect_box(slab(old, r, axis, vacated), extent, &mut diff.reclaims);
    }
    diff
}

/// The region box around `center` with `axis` restricted to `range`.
fn slab(center: IVec3, r: i32, axis: usize, range: RangeInclusive<i32>) -> [RangeInclusive<i32>; 3] {
    let mut ranges = [
        center.x - r..=center.x + r,
        center.y - r..=center.y + r,
        center.z - r..=center.z + r,
    ];
    ranges[axis] = range;
    ranges
}

fn collect_box(
    [xs, ys, zs]: [RangeInclusive<i32>; 3],
    extent: ChunkExtent,
    out: &mut FxHashSet<ChunkCoordinate>,
) {
    for z in zs {
        for y in ys.clone() {
            for x in xs.clone() {
                out.insert(ChunkCoordinate::from_grid(IVec3::new(x, y, z), extent));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
