//! Run-length compressed chunk storage, chunk coordinates, the per-coordinate
//! lifecycle tracker, and the bounded chunk store with its accessor snapshots.

pub mod accessor;
pub mod chunk;
pub mod coordinate;
pub mod registry;
pub mod rle;
pub mod state;
pub mod store;

pub use accessor::ChunkAccessor;
pub use chunk::{Chunk, ChunkData, ChunkDataBuilder, ChunkDataError, ChunkExtent};
pub use coordinate::ChunkCoordinate;
pub use registry::{BlockClassifier, BlockDef, BlockId, BlockRegistry, MeshGroup, RegistryError};
pub use rle::{BlockRun, RleError, RunEncoder, rle_decode, rle_encode};
pub use state::{ChunkState, ChunkStateTracker, TransitionError};
pub use store::{ChunkStore, StoreError};
