//! Top-level driver: owns every streaming component, turns focus movement
//! into claims and reclaims, and interleaves the two pipelines.

use std::sync::Arc;

use glam::DVec3;
use rustc_hash::FxHashSet;
use strata_config::{OrchestrationMode, SchedulerKind, StreamingConfig};
use strata_mesh::GreedyMesher;
use strata_terrain::ChunkGenerator;
use strata_voxel::{ChunkCoordinate, ChunkExtent, ChunkState, ChunkStateTracker, ChunkStore};
use tracing::{debug, error, info, warn};

use crate::error::StreamError;
use crate::generation::{DataGenerationScheduler, GenerationKernel, GenerationTick};
use crate::meshing::{MeshBuildScheduler, MeshKernel, MeshTick};
use crate::pool::{RenderObject, RenderResourcePool};
use crate::region::{region_contains, region_diff};
use crate::scheduler::{Scheduler, SyncScheduler, WorkerPool, build_scheduler};

/// Which pipeline an alternating orchestrator is currently ticking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Nothing pending.
    #[default]
    Idle,
    /// Data generation.
    Streaming,
    /// Mesh building.
    Meshing,
}

/// What one [`Orchestrator::tick`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Phase the tick ran in. In overlapped mode this names the pipeline
    /// with pending work, generation first.
    pub phase: PipelinePhase,
    /// Generation pipeline outcome, if it ticked.
    pub generation: Option<GenerationTick>,
    /// Mesh pipeline outcome, if it ticked.
    pub meshing: Option<MeshTick>,
    /// Coordinates moved from LOADED to MESHING after this tick's merges.
    pub promoted: usize,
}

/// Region changes applied by one [`Orchestrator::update_focus`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FocusUpdate {
    /// Coordinates that entered the load region and were claimed.
    pub load_claims: usize,
    /// Coordinates that left the load region and were unloaded.
    pub load_reclaims: usize,
    /// Coordinates that entered the draw region.
    pub draw_claims: usize,
    /// Coordinates that left the draw region.
    pub draw_reclaims: usize,
    /// Claims refused because the coordinate was already tracked.
    pub skipped: usize,
}

/// Running totals over the orchestrator's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Ticks run, blocking or not.
    pub ticks: u64,
    /// Chunks merged into the store.
    pub chunks_merged: u64,
    /// Meshes uploaded into render objects.
    pub meshes_applied: u64,
    /// Generated chunks discarded at integration.
    pub stale_chunks: u64,
    /// Built meshes discarded at integration.
    pub stale_meshes: u64,
    /// Chunks the store evicted over capacity.
    pub store_evictions: u64,
    /// Active chunks that lost their render object to a nearer claim.
    pub displaced: u64,
}

/// Owns the state tracker, store, pool and both pipelines.
///
/// Every map is mutated on the thread that calls [`update_focus`] and
/// [`tick`]; kernels only ever see accessor snapshots.
///
/// [`update_focus`]: Orchestrator::update_focus
/// [`tick`]: Orchestrator::tick
pub struct Orchestrator<R: RenderObject> {
    extent: ChunkExtent,
    draw_distance: u32,
    load_distance: u32,
    mode: OrchestrationMode,
    states: ChunkStateTracker,
    store: ChunkStore,
    pool: RenderResourcePool<R>,
    generation: DataGenerationScheduler,
    meshing: MeshBuildScheduler,
    focus: Option<ChunkCoordinate>,
    awaiting_mesh: FxHashSet<ChunkCoordinate>,
    phase: PipelinePhase,
    stats: OrchestratorStats,
}

impl<R: RenderObject> Orchestrator<R> {
    /// Builds every component from configuration. Both pipelines share one
    /// worker pool when the thread-pool scheduler is selected.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate, if worker threads cannot be
    /// spawned, or if the generator's extent differs from the configured one.
    pub fn new(
        config: &StreamingConfig,
        generator: ChunkGenerator,
        mesher: GreedyMesher,
        factory: impl FnMut() -> R + 'static,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        let (generation, meshing): (
            Box<dyn Scheduler<GenerationKernel>>,
            Box<dyn Scheduler<MeshKernel>>,
        ) = match config.scheduler {
            SchedulerKind::Synchronous => (Box::new(SyncScheduler::new()), Box::new(SyncScheduler::new())),
            SchedulerKind::ThreadPool => {
                let workers = Arc::new(WorkerPool::for_config(config)?);
                info!(threads = workers.thread_count(), "started shared worker pool");
                (
                    build_scheduler(config.scheduler, &workers),
                    build_scheduler(config.scheduler, &workers),
                )
            }
        };

        Self::from_parts(
            config,
            DataGenerationScheduler::new(generator, generation, config.stream_batch_size),
            MeshBuildScheduler::new(mesher, meshing, config.mesh_batch_size),
            factory,
        )
    }

    /// Builds an orchestrator around pipelines constructed by the caller.
    ///
    /// # Errors
    ///
    /// [`StreamError::Config`] if `config` does not validate, and
    /// [`StreamError::Invariant`] if the generator's extent differs from the
    /// configured one.
    pub fn from_parts(
        config: &StreamingConfig,
        generation: DataGenerationScheduler,
        meshing: MeshBuildScheduler,
        factory: impl FnMut() -> R + 'static,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        let [x, y, z] = config.chunk_extent;
        let extent = ChunkExtent::new(x, y, z);
        if generation.extent() != extent {
            return Err(StreamError::Invariant(format!(
                "generator extent {:?} does not match configured extent {:?}",
                generation.extent(),
                extent
            )));
        }

        info!(
            ?extent,
            draw_distance = config.draw_distance,
            load_distance = config.load_distance,
            store_capacity = config.store_capacity(),
            pool_capacity = config.pool_capacity(),
            mode = ?config.orchestration,
            "orchestrator ready"
        );
        Ok(Self {
            extent,
            draw_distance: config.draw_distance,
            load_distance: config.load_distance,
            mode: config.orchestration,
            states: ChunkStateTracker::new(),
            store: ChunkStore::new(extent, config.store_capacity()),
            pool: RenderResourcePool::new(config.pool_capacity(), factory),
            generation,
            meshing,
            focus: None,
            awaiting_mesh: FxHashSet::default(),
            phase: PipelinePhase::Idle,
            stats: OrchestratorStats::default(),
        })
    }

    /// Moves the focus to the chunk containing `world`.
    ///
    /// Reclaims are applied immediately: load-region leavers are unloaded
    /// and draw-region leavers give back their render object. Claims are
    /// queued: new load-region coordinates start STREAMING, new draw-region
    /// coordinates wait for their neighbourhood before meshing.
    pub fn update_focus(&mut self, world: DVec3) -> FocusUpdate {
        let focus = ChunkCoordinate::containing(world.floor().as_ivec3(), self.extent);
        if self.focus == Some(focus) {
            return FocusUpdate::default();
        }

        let previous = self.focus;
        let load = region_diff(previous, focus, self.load_distance, self.extent);
        let draw = region_diff(previous, focus, self.draw_distance, self.extent);
        let mut update = FocusUpdate {
            load_claims: load.claims.len(),
            load_reclaims: load.reclaims.len(),
            draw_claims: draw.claims.len(),
            draw_reclaims: draw.reclaims.len(),
            skipped: 0,
        };

        for &coord in &load.reclaims {
            self.unload(coord);
        }
        for &coord in &draw.reclaims {
            self.leave_draw_region(coord);
        }

        self.focus = Some(focus);
        self.store.update_focus(focus);
        self.pool.update_focus(focus);
        self.generation.reprioritize(focus);
        self.meshing.reprioritize(focus);

        for &coord in &load.claims {
            if let Err(err) = self.states.claim(coord, ChunkState::Streaming) {
                warn!(%err, "skipping load claim");
                update.skipped += 1;
                continue;
            }
            self.generation.enqueue(coord, coord.distance_sq(focus));
        }
        self.awaiting_mesh.extend(draw.claims.iter().copied());
        let promoted = self.promote_ready();

        debug!(
            %focus,
            load_claims = update.load_claims,
            load_reclaims = update.load_reclaims,
            draw_claims = update.draw_claims,
            draw_reclaims = update.draw_reclaims,
            promoted,
            "focus moved"
        );
        update
    }

    /// Forgets `coord` entirely: state, data, render object and queue entries.
    fn unload(&mut self, coord: ChunkCoordinate) {
        self.awaiting_mesh.remove(&coord);
        match self.states.remove(coord) {
            Some(ChunkState::Streaming) => {
                self.generation.cancel(coord);
            }
            Some(ChunkState::Meshing) => {
                self.meshing.cancel(coord);
            }
            Some(ChunkState::Active) => {
                self.pool.release(coord);
            }
            Some(ChunkState::Loaded) => {}
            None => {
                warn!(%coord, "reclaim of untracked chunk");
                return;
            }
        }
        self.store.remove(coord);
    }

    /// Returns a draw-region leaver to LOADED if it is still tracked.
    fn leave_draw_region(&mut self, coord: ChunkCoordinate) {
        self.awaiting_mesh.remove(&coord);
        match self.states.get(coord) {
            Some(ChunkState::Active) => {
                self.pool.release(coord);
            }
            Some(ChunkState::Meshing) => {
                self.meshing.cancel(coord);
            }
            _ => return,
        }
        if let Err(err) = self.states.advance_from(
            coord,
            &[ChunkState::Active, ChunkState::Meshing],
            ChunkState::Loaded,
        ) {
            warn!(%err, "skipping draw reclaim");
        }
    }

    /// Moves every awaiting coordinate whose whole neighbourhood is resident
    /// from LOADED to MESHING and queues it.
    ///
    /// This is the only place meshing is requested, so an accessor build
    /// can only miss a neighbour if one was evicted afterwards.
    fn promote_ready(&mut self) -> usize {
        let Some(focus) = self.focus else {
            return 0;
        };
        let ready: Vec<ChunkCoordinate> = self
            .awaiting_mesh
            .iter()
            .copied()
            .filter(|&coord| {
                self.states.get(coord) == Some(ChunkState::Loaded)
                    && self.states.neighborhood_resident(coord, self.extent)
            })
            .collect();

        let mut promoted = 0;
        for coord in ready {
            self.awaiting_mesh.remove(&coord);
            if let Err(err) = self.states.advance(coord, ChunkState::Loaded, ChunkState::Meshing) {
                warn!(%err, "skipping mesh claim");
                continue;
            }
            self.meshing.enqueue(coord, coord.distance_sq(focus));
            promoted += 1;
        }
        promoted
    }

    /// Runs one non-blocking tick.
    ///
    /// # Errors
    ///
    /// Any fatal pipeline error. The orchestrator should not be ticked again
    /// after one.
    pub fn tick(&mut self) -> Result<TickReport, StreamError> {
        self.step(false)
    }

    /// Ticks with blocking joins until both pipelines are quiescent or
    /// `max_ticks` have run. Returns the number of ticks.
    ///
    /// # Errors
    ///
    /// The first fatal pipeline error.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> Result<usize, StreamError> {
        let mut ticks = 0;
        while ticks < max_ticks && self.has_pending_work() {
            self.step(true)?;
            ticks += 1;
        }
        if self.has_pending_work() {
            warn!(max_ticks, "pipelines still busy after tick limit");
        }
        Ok(ticks)
    }

    fn step(&mut self, blocking: bool) -> Result<TickReport, StreamError> {
        self.stats.ticks += 1;
        let result = match self.mode {
            OrchestrationMode::Alternating => self.step_alternating(blocking),
            OrchestrationMode::Overlapped => self.step_overlapped(blocking),
        };
        if let Err(err) = &result {
            error!(%err, "orchestrator tick failed");
        }
        result
    }

    fn step_alternating(&mut self, blocking: bool) -> Result<TickReport, StreamError> {
        let streaming = self.generation.has_pending_work();
        let meshing = self.meshing.has_pending_work();
        let next = match self.phase {
            PipelinePhase::Meshing if meshing => PipelinePhase::Meshing,
            PipelinePhase::Streaming | PipelinePhase::Idle if streaming => PipelinePhase::Streaming,
            _ if meshing => PipelinePhase::Meshing,
            _ if streaming => PipelinePhase::Streaming,
            _ => PipelinePhase::Idle,
        };
        if next != self.phase {
            debug!(from = ?self.phase, to = ?next, "pipeline phase change");
            self.phase = next;
        }

        let mut report = TickReport {
            phase: next,
            ..TickReport::default()
        };
        match next {
            PipelinePhase::Streaming => {
                report.generation = Some(self.tick_generation(blocking)?);
                report.promoted = self.promote_ready();
            }
            PipelinePhase::Meshing => {
                report.meshing = Some(self.tick_meshing(blocking)?);
            }
            PipelinePhase::Idle => {}
        }
        Ok(report)
    }

    fn step_overlapped(&mut self, blocking: bool) -> Result<TickReport, StreamError> {
        let generation = self.tick_generation(blocking)?;
        let promoted = self.promote_ready();
        let meshing = self.tick_meshing(blocking)?;

        self.phase = if self.generation.has_pending_work() {
            PipelinePhase::Streaming
        } else if self.meshing.has_pending_work() {
            PipelinePhase::Meshing
        } else {
            PipelinePhase::Idle
        };
        Ok(TickReport {
            phase: self.phase,
            generation: Some(generation),
            meshing: Some(meshing),
            promoted,
        })
    }

    fn tick_generation(&mut self, blocking: bool) -> Result<GenerationTick, StreamError> {
        let report = self.generation.tick(&mut self.states, &mut self.store, blocking)?;
        for &coord in &report.evicted {
            if let Some(focus) = self.focus
                && region_contains(focus, self.load_distance, coord, self.extent)
            {
                warn!(%coord, "store evicted a chunk inside the load region");
            }
            self.unload(coord);
        }
        self.stats.chunks_merged += report.merged as u64;
        self.stats.stale_chunks += report.stale as u64;
        self.stats.store_evictions += report.evicted.len() as u64;
        Ok(report)
    }

    fn tick_meshing(&mut self, blocking: bool) -> Result<MeshTick, StreamError> {
        let report = self
            .meshing
            .tick(&mut self.states, &self.store, &mut self.pool, blocking)?;
        self.stats.meshes_applied += report.applied as u64;
        self.stats.stale_meshes += report.stale as u64;
        self.stats.displaced += report.displaced.len() as u64;
        Ok(report)
    }

    /// Verifies the cross-component invariants: store membership implies a
    /// resident state, pool membership implies ACTIVE, and the converse.
    ///
    /// # Errors
    ///
    /// [`StreamError::Invariant`] naming the first violation found.
    pub fn check_invariants(&self) -> Result<(), StreamError> {
        for coord in self.store.coordinates() {
            if !self.states.is_resident(coord) {
                return Err(StreamError::Invariant(format!(
                    "stored chunk {coord} is in state {:?}",
                    self.states.get(coord)
                )));
            }
        }
        for coord in self.pool.active_coordinates() {
            if self.states.get(coord) != Some(ChunkState::Active) {
                return Err(StreamError::Invariant(format!(
                    "pooled chunk {coord} is in state {:?}",
                    self.states.get(coord)
                )));
            }
        }
        for (coord, state) in self.states.iter() {
            if state.is_resident() && !self.store.contains(coord) {
                return Err(StreamError::Invariant(format!("{state:?} chunk {coord} has no data")));
            }
            if state == ChunkState::Active && !self.pool.contains(coord) {
                return Err(StreamError::Invariant(format!("active chunk {coord} has no render object")));
            }
        }
        Ok(())
    }

    /// Whether either pipeline has queued or in-flight work.
    pub fn has_pending_work(&self) -> bool {
        self.generation.has_pending_work() || self.meshing.has_pending_work()
    }

    /// Current focus chunk, `None` before the first [`update_focus`](Self::update_focus).
    pub fn focus(&self) -> Option<ChunkCoordinate> {
        self.focus
    }

    /// Chunk extent.
    pub fn extent(&self) -> ChunkExtent {
        self.extent
    }

    /// Current alternating phase.
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Pipeline interleaving mode.
    pub fn mode(&self) -> OrchestrationMode {
        self.mode
    }

    /// Lifecycle states.
    pub fn states(&self) -> &ChunkStateTracker {
        &self.states
    }

    /// Resident chunk data.
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Render objects.
    pub fn pool(&self) -> &RenderResourcePool<R> {
        &self.pool
    }

    /// Draw-region coordinates waiting for their neighbourhood to load.
    pub fn awaiting_mesh(&self) -> usize {
        self.awaiting_mesh.len()
    }

    /// Lifetime totals.
    pub fn stats(&self) -> OrchestratorStats {
        self.stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
