//! Mesh build pipeline: meshes MESHING coordinates against an accessor
//! snapshot and uploads the buffers into pooled render objects.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use strata_mesh::{GreedyMesher, MeshBuffer, MeshError};
use strata_voxel::{ChunkAccessor, ChunkCoordinate, ChunkState, ChunkStateTracker, ChunkStore};
use tracing::{debug, warn};

use crate::error::StreamError;
use crate::pool::{RenderObject, RenderResourcePool};
use crate::queue::BatchQueue;
use crate::scheduler::{Kernel, Scheduler};

/// Meshes one coordinate of a batch against the batch's shared snapshot.
///
/// Each coordinate owns one output slot holding a buffer allocated before
/// the batch starts; the job meshes straight into it.
pub struct MeshKernel {
    accessor: ChunkAccessor,
    mesher: GreedyMesher,
    slots: FxHashMap<ChunkCoordinate, Mutex<Option<MeshBuffer>>>,
}

impl MeshKernel {
    /// Kernel over `accessor` with one pre-allocated buffer per coordinate.
    pub fn new(
        accessor: ChunkAccessor,
        mesher: GreedyMesher,
        buffers: impl IntoIterator<Item = (ChunkCoordinate, MeshBuffer)>,
    ) -> Self {
        let slots = buffers
            .into_iter()
            .map(|(coord, buffer)| (coord, Mutex::new(Some(buffer))))
            .collect();
        Self {
            accessor,
            mesher,
            slots,
        }
    }

    fn take_buffer(&self, coord: ChunkCoordinate) -> MeshBuffer {
        self.slots
            .get(&coord)
            .and_then(|slot| slot.lock().ok().and_then(|mut buffer| buffer.take()))
            .unwrap_or_else(|| MeshBuffer::for_extent(self.accessor.extent()))
    }
}

impl Kernel for MeshKernel {
    type Input = ChunkCoordinate;
    type Output = Result<MeshBuffer, MeshError>;

    fn run(&self, coord: &ChunkCoordinate) -> Self::Output {
        let mut out = self.take_buffer(*coord);
        self.mesher.mesh_into(&self.accessor, *coord, &mut out)?;
        Ok(out)
    }
}

/// Outcome of one mesh tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MeshTick {
    /// Coordinates in the batch started this tick.
    pub scheduled: usize,
    /// Meshes uploaded into render objects.
    pub applied: usize,
    /// Finished meshes dropped because their coordinate left MESHING.
    pub stale: usize,
    /// Dequeued coordinates that were not MESHING at schedule time.
    pub skipped: usize,
    /// Coordinates whose render object was taken by a claim; now LOADED.
    pub displaced: Vec<ChunkCoordinate>,
}

/// Batches MESHING coordinates through the greedy mesher.
pub struct MeshBuildScheduler {
    mesher: GreedyMesher,
    scheduler: Box<dyn Scheduler<MeshKernel>>,
    queue: BatchQueue,
    batch_size: usize,
    /// Buffers handed back after upload, reused by later batches.
    spare: Vec<MeshBuffer>,
}

impl MeshBuildScheduler {
    /// Creates a pipeline that starts at most `batch_size` jobs per batch.
    pub fn new(mesher: GreedyMesher, scheduler: Box<dyn Scheduler<MeshKernel>>, batch_size: usize) -> Self {
        Self {
            mesher,
            scheduler,
            queue: BatchQueue::new(),
            batch_size: batch_size.max(1),
            spare: Vec::new(),
        }
    }

    /// Queues a coordinate already claimed as MESHING.
    pub fn enqueue(&mut self, coord: ChunkCoordinate, priority: u64) -> bool {
        self.queue.enqueue(coord, priority)
    }

    /// Drops a queued coordinate. In-flight jobs are not affected.
    pub fn cancel(&mut self, coord: ChunkCoordinate) -> bool {
        self.queue.cancel(coord)
    }

    /// Re-sorts the queue for a new focus.
    pub fn reprioritize(&mut self, focus: ChunkCoordinate) {
        self.queue.reprioritize(focus);
    }

    /// Coordinates waiting for a batch.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Jobs in the in-flight batch.
    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    /// Uploaded buffers waiting to be reused.
    pub fn spare_buffers(&self) -> usize {
        self.spare.len()
    }

    /// Whether anything is queued or in flight.
    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty() || !self.scheduler.is_idle()
    }

    /// Applies the in-flight batch if it has finished (or always, when
    /// `blocking`), then starts the next batch if the scheduler is free.
    ///
    /// # Errors
    ///
    /// Fails if the accessor cannot cover a batch's neighbourhoods, if a
    /// kernel fails, or if the pool rejects a claim.
    pub fn tick<R: RenderObject>(
        &mut self,
        states: &mut ChunkStateTracker,
        store: &ChunkStore,
        pool: &mut RenderResourcePool<R>,
        blocking: bool,
    ) -> Result<MeshTick, StreamError> {
        let mut report = MeshTick::default();
        if !self.scheduler.is_idle() {
            if !blocking && !self.scheduler.poll() {
                return Ok(report);
            }
            self.apply(states, pool, &mut report)?;
        }
        self.schedule_next(states, store, &mut report)?;
        Ok(report)
    }

    fn apply<R: RenderObject>(
        &mut self,
        states: &mut ChunkStateTracker,
        pool: &mut RenderResourcePool<R>,
        report: &mut MeshTick,
    ) -> Result<(), StreamError> {
        for (coord, result) in self.scheduler.complete()? {
            let mesh = result?;
            let state = states.get(coord);
            if state != Some(ChunkState::Meshing) {
                warn!(%coord, ?state, "discarding stale mesh");
                report.stale += 1;
                self.recycle(mesh);
                continue;
            }

            let claim = pool.claim(coord)?;
            claim.object.set_position(coord.origin());
            claim.object.upload_mesh(&mesh);
            claim.object.recalculate_bounds();
            let displaced = claim.evicted;
            self.recycle(mesh);

            if let Err(err) = states.advance(coord, ChunkState::Meshing, ChunkState::Active) {
                warn!(%err, "meshed chunk lost its meshing state");
            }
            if let Some(displaced) = displaced {
                if let Err(err) = states.advance(displaced, ChunkState::Active, ChunkState::Loaded) {
                    warn!(%err, "displaced render object owner was not active");
                }
                report.displaced.push(displaced);
            }
            report.applied += 1;
        }
        debug!(
            applied = report.applied,
            stale = report.stale,
            active = pool.active_count(),
            "applied mesh batch"
        );
        Ok(())
    }

    /// Keeps at most one batch worth of spare buffers.
    fn recycle(&mut self, mut mesh: MeshBuffer) {
        if self.spare.len() < self.batch_size {
            mesh.clear();
            self.spare.push(mesh);
        }
    }

    fn schedule_next(
        &mut self,
        states: &ChunkStateTracker,
        store: &ChunkStore,
        report: &mut MeshTick,
    ) -> Result<(), StreamError> {
        let batch: Vec<ChunkCoordinate> = self
            .queue
            .dequeue_batch(self.batch_size)
            .into_iter()
            .filter(|&coord| {
                let state = states.get(coord);
                let ready = state == Some(ChunkState::Meshing);
                if !ready {
                    warn!(%coord, ?state, "skipping mesh of chunk that is not meshing");
                    report.skipped += 1;
                }
                ready
            })
            .collect();
        if batch.is_empty() {
            return Ok(());
        }

        let accessor = store.build_accessor(&batch)?;
        report.scheduled = batch.len();
        debug!(
            count = batch.len(),
            snapshot = accessor.len(),
            scheduler = self.scheduler.name(),
            "scheduled mesh batch"
        );
        let extent = accessor.extent();
        let buffers: Vec<(ChunkCoordinate, MeshBuffer)> = batch
            .iter()
            .map(|&coord| {
                let buffer = self.spare.pop().unwrap_or_else(|| MeshBuffer::for_extent(extent));
                (coord, buffer)
            })
            .collect();
        let kernel = MeshKernel::new(accessor, self.mesher.clone(), buffers);
        self.scheduler.schedule(Arc::new(kernel), batch)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::HeadlessRenderObject;
    use crate::scheduler::SyncScheduler;
    use glam::IVec3;
    use strata_voxel::{BlockId, BlockRegistry, Chunk, ChunkData, ChunkExtent, StoreError};

    fn extent() -> ChunkExtent {
        ChunkExtent::cube(4)
    }

    fn center() -> ChunkCoordinate {
        ChunkCoordinate::new(0, 0, 0)
    }

    fn mesher() -> GreedyMesher {
        let registry = Arc::new(BlockRegistry::with_defaults());
        GreedyMesher::new(registry.clone(), registry)
    }

    fn pipeline() -> MeshBuildScheduler {
        MeshBuildScheduler::new(mesher(), Box::new(SyncScheduler::new()), 8)
    }

    /// Store holding the 27-neighbourhood of the origin chunk, all LOADED;
    /// chunks at or below y=0 are stone.
    fn loaded_world() -> (ChunkStateTracker, ChunkStore) {
        let mut states = ChunkStateTracker::new();
        let mut store = ChunkStore::new(extent(), 64);
        let chunks: Vec<Chunk> = center()
            .neighborhood(extent())
            .map(|c| {
                let block = if c.y <= 0 { BlockId(1) } else { BlockId::AIR };
                Chunk::new(c, ChunkData::filled(extent(), block))
            })
            .collect();
        for chunk in &chunks {
            states.claim(chunk.coordinate(), ChunkState::Loaded).expect("claim");
        }
        store.add_batch(chunks).expect("store");
        (states, store)
    }

    fn pool() -> RenderResourcePool<HeadlessRenderObject> {
        RenderResourcePool::new(8, HeadlessRenderObject::default)
    }

    #[test]
    fn test_meshed_chunk_becomes_active_with_uploaded_mesh() {
        let (mut states, store) = loaded_world();
        let mut pool = pool();
        let mut pipeline = pipeline();
        states
            .advance(center(), ChunkState::Loaded, ChunkState::Meshing)
            .expect("loaded");
        pipeline.enqueue(center(), 0);

        let first = pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        assert_eq!(first.scheduled, 1);
        let second = pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        assert_eq!(second.applied, 1);

        assert_eq!(states.get(center()), Some(ChunkState::Active));
        let object = pool.get(center()).expect("render object");
        assert_eq!(object.uploads, 1);
        assert_eq!(object.position, IVec3::ZERO);
        // Stone chunk under air: only the top face is visible.
        assert_eq!(object.vertex_count, 4);
        assert!(object.bounds.is_some());
        assert!(!pipeline.has_pending_work());
    }

    #[test]
    fn test_mesh_for_reclaimed_chunk_is_stale() {
        let (mut states, store) = loaded_world();
        let mut pool = pool();
        let mut pipeline = pipeline();
        states
            .advance(center(), ChunkState::Loaded, ChunkState::Meshing)
            .expect("loaded");
        pipeline.enqueue(center(), 0);
        pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");

        states
            .advance(center(), ChunkState::Meshing, ChunkState::Loaded)
            .expect("meshing");
        let tick = pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        assert_eq!(tick.stale, 1);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(states.get(center()), Some(ChunkState::Loaded));
    }

    #[test]
    fn test_coordinate_not_meshing_is_skipped() {
        let (mut states, store) = loaded_world();
        let mut pool = pool();
        let mut pipeline = pipeline();
        pipeline.enqueue(center(), 0);
        let tick = pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        assert_eq!(tick.skipped, 1);
        assert_eq!(tick.scheduled, 0);
    }

    #[test]
    fn test_missing_neighbor_halts_the_batch() {
        let (mut states, mut store) = loaded_world();
        let mut pool = pool();
        let mut pipeline = pipeline();
        let west = center().offset_chunks(-1, 0, 0, extent());
        store.remove(west);
        states
            .advance(center(), ChunkState::Loaded, ChunkState::Meshing)
            .expect("loaded");
        pipeline.enqueue(center(), 0);

        let err = pipeline.tick(&mut states, &store, &mut pool, false).unwrap_err();
        assert!(matches!(
            err,
            StreamError::Store(StoreError::MissingNeighbor { neighbor, .. }) if neighbor == west
        ));
    }

    #[test]
    fn test_full_pool_displaces_farthest_active_chunk() {
        let (mut states, store) = loaded_world();
        let mut pool = RenderResourcePool::new(1, HeadlessRenderObject::default);
        let mut pipeline = pipeline();

        // A far chunk already holds the only object.
        let far = center().offset_chunks(1, 1, 1, extent());
        states.advance(far, ChunkState::Loaded, ChunkState::Active).expect("loaded");
        pool.claim(far).expect("claim");

        states
            .advance(center(), ChunkState::Loaded, ChunkState::Meshing)
            .expect("loaded");
        pipeline.enqueue(center(), 0);
        pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        let tick = pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");

        assert_eq!(tick.displaced, vec![far]);
        assert_eq!(states.get(far), Some(ChunkState::Loaded));
        assert!(pool.contains(center()));
        assert!(!pool.contains(far));
    }

    #[test]
    fn test_kernel_meshes_into_its_preallocated_slot() {
        let (_, store) = loaded_world();
        let accessor = store.build_accessor(&[center()]).expect("accessor");
        let buffer = MeshBuffer::for_extent(extent());
        let vertices = buffer.vertices.as_ptr();
        let kernel = MeshKernel::new(accessor, mesher(), [(center(), buffer)]);

        let mesh = kernel.run(&center()).expect("mesh");
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.vertices.as_ptr(), vertices, "kernel reallocated its output");

        // A coordinate without a slot still gets a pre-sized buffer.
        let accessor = store.build_accessor(&[center()]).expect("accessor");
        let bare = MeshKernel::new(accessor, mesher(), Vec::<(ChunkCoordinate, MeshBuffer)>::new());
        let mesh = bare.run(&center()).expect("mesh");
        assert!(mesh.vertices.capacity() >= MeshBuffer::for_extent(extent()).vertices.capacity());
    }

    #[test]
    fn test_uploaded_buffers_are_reused_by_later_batches() {
        let (mut states, store) = loaded_world();
        let mut pool = pool();
        let mut pipeline = pipeline();
        states
            .advance(center(), ChunkState::Loaded, ChunkState::Meshing)
            .expect("loaded");
        pipeline.enqueue(center(), 0);
        pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        assert_eq!(pipeline.spare_buffers(), 0);
        pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        assert_eq!(pipeline.spare_buffers(), 1, "uploaded buffer returns to the spare list");

        // Remesh the same chunk: the spare buffer goes back into a slot.
        pool.release(center());
        states
            .advance(center(), ChunkState::Active, ChunkState::Meshing)
            .expect("active");
        pipeline.enqueue(center(), 0);
        let tick = pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        assert_eq!(tick.scheduled, 1);
        assert_eq!(pipeline.spare_buffers(), 0);
        pipeline.tick(&mut states, &store, &mut pool, false).expect("tick");
        assert_eq!(pipeline.spare_buffers(), 1);
        assert_eq!(pool.get(center()).map(|o| o.vertex_count), Some(4));
    }
}
