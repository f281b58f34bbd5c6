//! Chunk synthesis: samples the field at every cell in iteration order and
//! run-length encodes as it goes.

use std::sync::Arc;

use glam::DVec3;
use strata_voxel::{Chunk, ChunkCoordinate, ChunkDataBuilder, ChunkExtent};
use tracing::trace;

use crate::error::TerrainError;
use crate::field::ScalarField;
use crate::palette::TerrainPalette;

/// Generates chunks from a scalar field and a palette.
#[derive(Clone)]
pub struct ChunkGenerator {
    field: Arc<dyn ScalarField>,
    palette: TerrainPalette,
    extent: ChunkExtent,
}

impl ChunkGenerator {
    /// Creates a generator for chunks of `extent`.
    pub fn new(field: Arc<dyn ScalarField>, palette: TerrainPalette, extent: ChunkExtent) -> Self {
        Self {
            field,
            palette,
            extent,
        }
    }

    /// Chunk extent produced.
    pub fn extent(&self) -> ChunkExtent {
        self.extent
    }

    /// Palette in use.
    pub fn palette(&self) -> &TerrainPalette {
        &self.palette
    }

    /// Synthesises the chunk at `coord`.
    pub fn generate(&self, coord: ChunkCoordinate) -> Result<Chunk, TerrainError> {
        let origin = coord.origin();
        let mut builder = ChunkDataBuilder::new(self.extent);
        for z in 0..self.extent.z as i32 {
            for y in 0..self.extent.y as i32 {
                let world_y = origin.y + y;
                for x in 0..self.extent.x as i32 {
                    let world = DVec3::new(
                        f64::from(origin.x + x),
                        f64::from(world_y),
                        f64::from(origin.z + z),
                    );
                    let density = self.field.sample(world);
                    builder.push(self.palette.classify(density, world_y));
                }
            }
        }
        let data = builder.finish()?;
        trace!(%coord, runs = data.run_count(), "generated chunk");
        Ok(Chunk::new(coord, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_config::TerrainConfig;
    use strata_voxel::{BlockId, BlockRegistry};

    fn generator(field: impl Fn(DVec3) -> f64 + Send + Sync + 'static) -> ChunkGenerator {
        let config = TerrainConfig {
            water_level: -8,
            surface_depth: 3.0,
            ..TerrainConfig::default()
        };
        let palette =
            TerrainPalette::from_registry(&BlockRegistry::with_defaults(), &config).expect("palette");
        ChunkGenerator::new(Arc::new(field), palette, ChunkExtent::cube(4))
    }

    #[test]
    fn test_flat_field_layers() {
        let generator = generator(|p| 2.0 - p.y);
        let chunk = generator.generate(ChunkCoordinate::new(0, 0, 0)).expect("generate");
        let data = chunk.data();
        let p = generator.palette();
        for x in 0..4 {
            for z in 0..4 {
                assert_eq!(data.get(x, 0, z), p.subsurface);
                assert_eq!(data.get(x, 1, z), p.top);
                assert_eq!(data.get(x, 2, z), BlockId::AIR);
                assert_eq!(data.get(x, 3, z), BlockId::AIR);
            }
        }
        // Each z-slice contributes a subsurface run, a top run and one air run.
        assert_eq!(data.run_count(), 4 * 3);
    }

    #[test]
    fn test_deep_and_high_chunks_are_uniform() {
        let generator = generator(|p| 2.0 - p.y);
        let deep = generator.generate(ChunkCoordinate::new(0, -16, 4)).expect("deep");
        assert_eq!(deep.data().uniform_block(), Some(generator.palette().solid));
        let sky = generator.generate(ChunkCoordinate::new(-4, 16, 0)).expect("sky");
        assert_eq!(sky.data().uniform_block(), Some(BlockId::AIR));
    }

    #[test]
    fn test_open_space_below_water_level_is_water() {
        let generator = generator(|_| -5.0);
        let chunk = generator.generate(ChunkCoordinate::new(0, -12, 0)).expect("generate");
        assert_eq!(chunk.data().uniform_block(), Some(generator.palette().water));
        assert_eq!(chunk.coordinate(), ChunkCoordinate::new(0, -12, 0));
    }
}
