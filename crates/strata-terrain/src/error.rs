use strata_voxel::RleError;
use thiserror::Error;

/// Errors raised while building the generator or synthesising a chunk.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// The block registry lacks a block the palette needs.
    #[error("block registry has no block named {0:?}")]
    MissingBlock(&'static str),

    /// The encoded runs did not cover the chunk volume.
    #[error("generated chunk has the wrong size: {0}")]
    Encoding(#[from] RleError),
}
