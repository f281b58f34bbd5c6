//! Maps a density sample and height to a block.

use strata_config::TerrainConfig;
use strata_voxel::{BlockId, BlockRegistry};

use crate::error::TerrainError;

/// Block choices for terrain classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainPalette {
    /// Deep solid block.
    pub solid: BlockId,
    /// Band just below the surface.
    pub subsurface: BlockId,
    /// Topmost block of a dry column.
    pub top: BlockId,
    /// Topmost block at or below the water line.
    pub shore: BlockId,
    /// Fills open space below `water_level`.
    pub water: BlockId,
    /// World height of the water surface.
    pub water_level: i32,
    /// Density below which the subsurface block is used instead of `solid`.
    pub surface_depth: u32,
}

impl TerrainPalette {
    /// Resolves the default terrain blocks by name.
    pub fn from_registry(registry: &BlockRegistry, config: &TerrainConfig) -> Result<Self, TerrainError> {
        let lookup = |name: &'static str| {
            registry
                .lookup_by_name(name)
                .ok_or(TerrainError::MissingBlock(name))
        };
        Ok(Self {
            solid: lookup("stone")?,
            subsurface: lookup("dirt")?,
            top: lookup("grass")?,
            shore: lookup("sand")?,
            water: lookup("water")?,
            water_level: config.water_level,
            surface_depth: config.surface_depth.max(1.0) as u32,
        })
    }

    /// Block for a cell with `density` at world height `y`.
    pub fn classify(&self, density: f64, y: i32) -> BlockId {
        if density <= 0.0 {
            return if y < self.water_level {
                self.water
            } else {
                BlockId::AIR
            };
        }
        if density > f64::from(self.surface_depth) {
            self.solid
        } else if density > 1.0 {
            self.subsurface
        } else if y <= self.water_level {
            self.shore
        } else {
            self.top
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> TerrainPalette {
        let config = TerrainConfig {
            water_level: 0,
            surface_depth: 3.0,
            ..TerrainConfig::default()
        };
        TerrainPalette::from_registry(&BlockRegistry::with_defaults(), &config).expect("defaults")
    }

    #[test]
    fn test_classification_bands() {
        let p = palette();
        assert_eq!(p.classify(10.0, 5), p.solid);
        assert_eq!(p.classify(2.5, 5), p.subsurface);
        assert_eq!(p.classify(0.5, 5), p.top);
        assert_eq!(p.classify(0.5, 0), p.shore);
        assert_eq!(p.classify(0.0, 5), BlockId::AIR);
        assert_eq!(p.classify(-4.0, -1), p.water);
    }

    #[test]
    fn test_missing_block_is_reported() {
        let err = TerrainPalette::from_registry(&BlockRegistry::new(), &TerrainConfig::default())
            .unwrap_err();
        assert!(matches!(err, TerrainError::MissingBlock("stone")));
    }
}
