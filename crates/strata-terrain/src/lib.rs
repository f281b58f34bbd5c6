//! Procedural terrain synthesis: a scalar density field sampled per cell,
//! classified into blocks and run-length encoded on the fly.

mod error;
mod field;
mod generator;
mod noise_field;
mod palette;

pub use error::TerrainError;
pub use field::ScalarField;
pub use generator::ChunkGenerator;
pub use noise_field::{NoiseField, NoiseParams};
pub use palette::TerrainPalette;
