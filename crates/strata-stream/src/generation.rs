//! Data generation pipeline: turns STREAMING coordinates into stored chunks.

use std::sync::Arc;

use strata_terrain::{ChunkGenerator, TerrainError};
use strata_voxel::{Chunk, ChunkCoordinate, ChunkExtent, ChunkState, ChunkStateTracker, ChunkStore};
use tracing::{debug, warn};

use crate::error::StreamError;
use crate::queue::BatchQueue;
use crate::scheduler::{Kernel, Scheduler};

/// Synthesises one chunk per coordinate.
pub struct GenerationKernel {
    generator: ChunkGenerator,
}

impl GenerationKernel {
    /// Wraps a chunk generator.
    pub fn new(generator: ChunkGenerator) -> Self {
        Self { generator }
    }
}

impl Kernel for GenerationKernel {
    type Input = ChunkCoordinate;
    type Output = Result<Chunk, TerrainError>;

    fn run(&self, coord: &ChunkCoordinate) -> Self::Output {
        self.generator.generate(*coord)
    }
}

/// Outcome of one generation tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerationTick {
    /// Coordinates in the batch started this tick.
    pub scheduled: usize,
    /// Chunks merged into the store.
    pub merged: usize,
    /// Finished chunks dropped because their coordinate left STREAMING.
    pub stale: usize,
    /// Dequeued coordinates that were not STREAMING at schedule time.
    pub skipped: usize,
    /// Coordinates the store evicted to stay within capacity. The caller
    /// must forget them.
    pub evicted: Vec<ChunkCoordinate>,
}

/// Batches STREAMING coordinates through a generation kernel and merges the
/// results into the store.
pub struct DataGenerationScheduler {
    kernel: Arc<GenerationKernel>,
    scheduler: Box<dyn Scheduler<GenerationKernel>>,
    queue: BatchQueue,
    batch_size: usize,
}

impl DataGenerationScheduler {
    /// Creates a pipeline that starts at most `batch_size` jobs per batch.
    pub fn new(
        generator: ChunkGenerator,
        scheduler: Box<dyn Scheduler<GenerationKernel>>,
        batch_size: usize,
    ) -> Self {
        Self {
            kernel: Arc::new(GenerationKernel::new(generator)),
            scheduler,
            queue: BatchQueue::new(),
            batch_size: batch_size.max(1),
        }
    }

    /// Extent of the chunks this pipeline generates.
    pub fn extent(&self) -> ChunkExtent {
        self.kernel.generator.extent()
    }

    /// Queues a coordinate already claimed as STREAMING.
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

    /// Whether anything is queued or in flight.
    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty() || !self.scheduler.is_idle()
    }

    /// Integrates the in-flight batch if it has finished (or always, when
    /// `blocking`), then starts the next batch if the scheduler is free.
    pub fn tick(
        &mut self,
        states: &mut ChunkStateTracker,
        store: &mut ChunkStore,
        blocking: bool,
    ) -> Result<GenerationTick, StreamError> {
        let mut report = GenerationTick::default();
        if !self.scheduler.is_idle() {
            if !blocking && !self.scheduler.poll() {
                return Ok(report);
            }
            self.integrate(states, store, &mut report)?;
        }
        self.schedule_next(states, &mut report)?;
        Ok(report)
    }

    fn integrate(
        &mut self,
        states: &mut ChunkStateTracker,
        store: &mut ChunkStore,
        report: &mut GenerationTick,
    ) -> Result<(), StreamError> {
        let results = self.scheduler.complete()?;
        let mut fresh = Vec::with_capacity(results.len());
        for (coord, result) in results {
            let chunk = result?;
            match states.get(coord) {
                Some(ChunkState::Streaming) => fresh.push(chunk),
                state => {
                    warn!(%coord, ?state, "discarding stale chunk");
                    report.stale += 1;
                }
            }
        }

        let merged: Vec<ChunkCoordinate> = fresh.iter().map(Chunk::coordinate).collect();
        report.evicted = store.add_batch(fresh)?;
        for coord in merged {
            if let Err(err) = states.advance(coord, ChunkState::Streaming, ChunkState::Loaded) {
                warn!(%err, "merged chunk lost its streaming state");
                continue;
            }
            report.merged += 1;
        }
        debug!(
            merged = report.merged,
            stale = report.stale,
            evicted = report.evicted.len(),
            "integrated generation batch"
        );
        Ok(())
    }

    fn schedule_next(
        &mut self,
        states: &ChunkStateTracker,
        report: &mut GenerationTick,
    ) -> Result<(), StreamError> {
        let batch: Vec<ChunkCoordinate> = self
            .queue
            .dequeue_batch(self.batch_size)
            .into_iter()
            .filter(|&coord| {
                let state = states.get(coord);
                let ready = state == Some(ChunkState::Streaming);
                if !ready {
                    warn!(%coord, ?state, "skipping generation of chunk that is not streaming");
                    report.skipped += 1;
                }
                ready
            })
            .collect();
        if batch.is_empty() {
            return Ok(());
        }

        report.scheduled = batch.len();
        debug!(
            count = batch.len(),
            queued = self.queue.len(),
            scheduler = self.scheduler.name(),
            "scheduled generation batch"
        );
        self.scheduler.schedule(Arc::clone(&self.kernel), batch)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
