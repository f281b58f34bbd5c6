//! Error types for the streaming pipelines.

use strata_config::ConfigError;
use strata_mesh::MeshError;
use strata_terrain::TerrainError;
use strata_voxel::{ChunkCoordinate, StoreError};
use thiserror::Error;

/// Failures of a batch scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `schedule` was called while a batch is still in flight.
    #[error("a batch is already in flight")]
    Busy,
    /// The worker pool no longer accepts jobs.
    #[error("worker pool has shut down")]
    WorkerPoolClosed,
    /// A job finished without writing its result slot (the kernel panicked).
    #[error("job {index} finished without producing output")]
    MissingOutput {
        /// Position of the job in its batch.
        index: usize,
    },
    /// A job still held the result slots after the batch counter reached zero.
    #[error("result slots are still shared with a worker job")]
    SlotsShared,
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Render resource pool failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// `claim` was called for a coordinate that already owns a render object.
    #[error("chunk {0} already owns a render object")]
    AlreadyActive(ChunkCoordinate),
}

/// Fatal errors that halt an orchestrator tick.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Chunk store invariant violated.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Meshing kernel failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),
    /// Terrain synthesis failed.
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    /// Scheduler failure.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// Render pool invariant violated.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// Streaming configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Cross-component consistency check failed.
    #[error("invariant violated: {0}")]
    Invariant(String),
}
