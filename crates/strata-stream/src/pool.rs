//! Bounded pool of render objects keyed by chunk coordinate.
//!
//! When every object is in use, claiming a new coordinate takes the object
//! from the active chunk farthest from the focus.

use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;
use strata_mesh::MeshBuffer;
use strata_voxel::ChunkCoordinate;
use tracing::debug;

use crate::error::PoolError;

/// What the pool needs from the surrounding renderer.
pub trait RenderObject {
    /// Moves the object to a chunk origin.
    fn set_position(&mut self, origin: IVec3);
    /// Replaces the object's geometry.
    fn upload_mesh(&mut self, mesh: &MeshBuffer);
    /// Recomputes culling bounds after an upload.
    fn recalculate_bounds(&mut self);
}

/// Render object without a GPU behind it; records what it was given.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeadlessRenderObject {
    /// Last position set.
    pub position: IVec3,
    /// Number of uploads received over the object's lifetime.
    pub uploads: usize,
    /// Vertices in the current mesh.
    pub vertex_count: usize,
    /// Opaque indices in the current mesh.
    pub opaque_index_count: usize,
    /// Translucent indices in the current mesh.
    pub translucent_index_count: usize,
    /// World-space bounds of the current mesh, `None` if it is empty.
    pub bounds: Option<(Vec3, Vec3)>,
    local_min: Option<Vec3>,
    local_max: Option<Vec3>,
}

impl RenderObject for HeadlessRenderObject {
    fn set_position(&mut self, origin: IVec3) {
        self.position = origin;
    }

    fn upload_mesh(&mut self, mesh: &MeshBuffer) {
        self.uploads += 1;
        self.vertex_count = mesh.vertices.len();
        self.opaque_index_count = mesh.opaque_indices.len();
        self.translucent_index_count = mesh.translucent_indices.len();
        let mut positions = mesh.vertices.iter().map(|v| Vec3::from(v.position));
        let first = positions.next();
        self.local_min = first.map(|p| positions.clone().fold(p, Vec3::min));
        self.local_max = first.map(|p| positions.fold(p, Vec3::max));
    }

    fn recalculate_bounds(&mut self) {
        let offset = self.position.as_vec3();
        self.bounds = self
            .local_min
            .zip(self.local_max)
            .map(|(min, max)| (min + offset, max + offset));
    }
}

struct PoolEntry<R> {
    object: R,
    priority: u64,
}

/// A successful claim: the object to upload into and the coordinate whose
/// object was taken, if the pool was full.
pub struct Claim<'a, R> {
    /// Object now registered for the claimed coordinate.
    pub object: &'a mut R,
    /// Coordinate that lost its object.
    pub evicted: Option<ChunkCoordinate>,
}

/// Capacity-bounded set of render objects.
pub struct RenderResourcePool<R: RenderObject> {
    factory: Box<dyn FnMut() -> R>,
    capacity: usize,
    focus: ChunkCoordinate,
    free: Vec<R>,
    active: FxHashMap<ChunkCoordinate, PoolEntry<R>>,
    created: usize,
    evictions: usize,
}

impl<R: RenderObject> RenderResourcePool<R> {
    /// Creates an empty pool that builds objects with `factory` on demand.
    pub fn new(capacity: usize, factory: impl FnMut() -> R + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            capacity: capacity.max(1),
            focus: ChunkCoordinate::default(),
            free: Vec::new(),
            active: FxHashMap::default(),
            created: 0,
            evictions: 0,
        }
    }

    /// Registers an object for `coord`, reclaiming the farthest active object
    /// first if the pool is full.
    ///
    /// # Errors
    ///
    /// [`PoolError::AlreadyActive`] if `coord` already holds an object.
    pub fn claim(&mut self, coord: ChunkCoordinate) -> Result<Claim<'_, R>, PoolError> {
        if self.active.contains_key(&coord) {
            return Err(PoolError::AlreadyActive(coord));
        }

        let evicted = if self.active.len() >= self.capacity {
            let worst = self
                .active
                .iter()
                .map(|(c, entry)| (entry.priority, *c))
                .max()
                .map(|(_, c)| c);
            if let Some(worst) = worst {
                self.release(worst);
                self.evictions += 1;
                debug!(%worst, claimed = %coord, "reclaimed farthest render object");
            }
            worst
        } else {
            None
        };

        let object = match self.free.pop() {
            Some(object) => object,
            None => {
                self.created += 1;
                (self.factory)()
            }
        };
        let entry = self.active.entry(coord).or_insert(PoolEntry {
            object,
            priority: coord.distance_sq(self.focus),
        });
        Ok(Claim {
            object: &mut entry.object,
            evicted,
        })
    }

    /// Returns `coord`'s object to the free list. `false` if it had none.
    pub fn release(&mut self, coord: ChunkCoordinate) -> bool {
        match self.active.remove(&coord) {
            Some(entry) => {
                self.free.push(entry.object);
                true
            }
            None => false,
        }
    }

    /// Recomputes active priorities against a new focus.
    pub fn update_focus(&mut self, focus: ChunkCoordinate) {
        self.focus = focus;
        for (coord, entry) in &mut self.active {
            entry.priority = coord.distance_sq(focus);
        }
    }

    /// Whether `coord` holds an object.
    pub fn contains(&self, coord: ChunkCoordinate) -> bool {
        self.active.contains_key(&coord)
    }

    /// The object held by `coord`.
    pub fn get(&self, coord: ChunkCoordinate) -> Option<&R> {
        self.active.get(&coord).map(|entry| &entry.object)
    }

    /// Coordinates holding objects.
    pub fn active_coordinates(&self) -> impl Iterator<Item = ChunkCoordinate> + '_ {
        self.active.keys().copied()
    }

    /// Maximum number of active objects.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Objects currently in use.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Idle objects waiting for reuse.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Objects built by the factory so far.
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Claims that had to take an object from another chunk.
    pub fn evictions(&self) -> usize {
        self.evictions
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
