//! Chunk streaming around a moving focus.
//!
//! Two batched pipelines share one scheduler interface: the data generation
//! pipeline synthesises chunks into the [`ChunkStore`](strata_voxel::ChunkStore),
//! and the mesh build pipeline runs the greedy mesher against accessor
//! snapshots and uploads the results into a [`RenderResourcePool`]. The
//! [`Orchestrator`] owns both, plus the lifecycle state tracker, and
//! interleaves their ticks.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use glam::DVec3;
//! use strata_config::Config;
//! use strata_mesh::GreedyMesher;
//! use strata_stream::{HeadlessRenderObject, Orchestrator};
//! use strata_terrain::{ChunkGenerator, NoiseField, TerrainPalette};
//! use strata_voxel::{BlockRegistry, ChunkExtent};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let registry = Arc::new(BlockRegistry::with_defaults());
//! let palette = TerrainPalette::from_registry(&registry, &config.terrain)?;
//! let [x, y, z] = config.streaming.chunk_extent;
//! let generator = ChunkGenerator::new(
//!     Arc::new(NoiseField::from_config(&config.terrain)),
//!     palette,
//!     ChunkExtent::new(x, y, z),
//! );
//! let mesher = GreedyMesher::new(registry.clone(), registry);
//! let mut orchestrator =
//!     Orchestrator::new(&config.streaming, generator, mesher, HeadlessRenderObject::default)?;
//!
//! orchestrator.update_focus(DVec3::ZERO);
//! orchestrator.run_until_idle(10_000)?;
//! # Ok(())
//! # }
//! ```

mod error;
mod generation;
mod meshing;
mod orchestrator;
mod pool;
mod queue;
mod region;
mod scheduler;

pub use error::{PoolError, SchedulerError, StreamError};
pub use generation::{DataGenerationScheduler, GenerationKernel, GenerationTick};
pub use meshing::{MeshBuildScheduler, MeshKernel, MeshTick};
pub use orchestrator::{FocusUpdate, Orchestrator, OrchestratorStats, PipelinePhase, TickReport};
pub use pool::{Claim, HeadlessRenderObject, RenderObject, RenderResourcePool};
pub use queue::BatchQueue;
pub use region::{RegionDiff, region_contains, region_coordinates, region_diff};
pub use scheduler::{
    Kernel, Scheduler, SyncScheduler, ThreadPoolScheduler, WorkerPool, build_scheduler,
};
