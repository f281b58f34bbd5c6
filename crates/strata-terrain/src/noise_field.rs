//! Multi-octave fractal Brownian motion (fBm) terrain density with 3D cave
//! carving.
//!
//! Density is the fBm surface height at the column minus the sample height,
//! so it counts blocks below the surface. Caves punch open space into the
//! volume where a second, 3D noise exceeds a threshold.

use glam::DVec3;
use noise::{NoiseFn, Simplex};
use strata_config::TerrainConfig;

use crate::field::ScalarField;

/// Parameters of the density field.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseParams {
    /// World seed for deterministic generation.
    pub seed: u64,
    /// Number of octaves composited for the surface height.
    pub octaves: u32,
    /// Frequency of the first octave.
    pub base_frequency: f64,
    /// Amplitude of the first octave, in blocks.
    pub amplitude: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Mean surface height.
    pub base_height: f64,
    /// Frequency of the cave noise; 0 disables caves.
    pub cave_frequency: f64,
    /// Cave noise above this value is open space.
    pub cave_threshold: f64,
    /// Caves are only carved above this height so they never flood.
    pub cave_floor: f64,
    /// Caves never reach closer than this to the surface.
    pub cave_min_depth: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self::from(&TerrainConfig::default())
    }
}

impl From<&TerrainConfig> for NoiseParams {
    fn from(config: &TerrainConfig) -> Self {
        Self {
            seed: config.seed,
            octaves: config.octaves,
            base_frequency: config.base_frequency,
            amplitude: config.amplitude,
            persistence: config.persistence,
            lacunarity: config.lacunarity,
            base_height: config.base_height,
            cave_frequency: config.cave_frequency,
            cave_threshold: config.cave_threshold,
            cave_floor: f64::from(config.water_level),
            cave_min_depth: config.surface_depth,
        }
    }
}

/// Terrain density field over simplex noise.
pub struct NoiseField {
    height_noise: Simplex,
    cave_noise: Simplex,
    params: NoiseParams,
}

impl NoiseField {
    /// Creates a field with the given parameters.
    pub fn new(params: NoiseParams) -> Self {
        Self {
            height_noise: Simplex::new(params.seed as u32),
            // Offset the seed to decorrelate caves from the surface.
            cave_noise: Simplex::new(params.seed.wrapping_add(0xCAFE_BABE) as u32),
            params,
        }
    }

    /// Field described by a terrain configuration.
    pub fn from_config(config: &TerrainConfig) -> Self {
        Self::new(NoiseParams::from(config))
    }

    /// Parameters in use.
    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    /// Surface height of the column at `(x, z)`.
    pub fn surface_height(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            total += self.height_noise.get([x * frequency, z * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        self.params.base_height + total
    }

    /// Whether `position`, `depth` blocks below the surface, is carved out.
    fn is_cave(&self, position: DVec3, depth: f64) -> bool {
        let p = &self.params;
        if p.cave_frequency <= 0.0 || depth <= p.cave_min_depth || position.y <= p.cave_floor {
            return false;
        }
        let scaled = position * p.cave_frequency;
        self.cave_noise.get([scaled.x, scaled.y, scaled.z]) > p.cave_threshold
    }
}

impl ScalarField for NoiseField {
    fn sample(&self, position: DVec3) -> f64 {
        let depth = self.surface_height(position.x, position.z) - position.y;
        if depth > 0.0 && self.is_cave(position, depth) {
            return -1.0;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_params() -> NoiseParams {
        NoiseParams {
            cave_frequency: 0.0,
            ..NoiseParams::default()
        }
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let a = NoiseField::new(flat_params());
        let b = NoiseField::new(flat_params());
        let p = DVec3::new(123.0, 4.0, -57.0);
        assert_eq!(a.sample(p), b.sample(p));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = NoiseField::new(NoiseParams { seed: 1, ..flat_params() });
        let b = NoiseField::new(NoiseParams { seed: 2, ..flat_params() });
        let differs = (0..16).any(|i| {
            let x = f64::from(i) * 17.3;
            a.surface_height(x, 3.0) != b.surface_height(x, 3.0)
        });
        assert!(differs, "seeds 1 and 2 produced identical terrain");
    }

    #[test]
    fn test_density_drops_one_per_block_without_caves() {
        let field = NoiseField::new(flat_params());
        let low = field.sample(DVec3::new(10.0, 3.0, 20.0));
        let high = field.sample(DVec3::new(10.0, 4.0, 20.0));
        assert!((low - high - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_surface_stays_within_amplitude_bounds() {
        let field = NoiseField::new(flat_params());
        let p = field.params();
        let max = p.amplitude / (1.0 - p.persistence);
        for i in 0..64 {
            let h = field.surface_height(f64::from(i) * 31.7, f64::from(i) * -11.1);
            assert!((h - p.base_height).abs() <= max, "height {h} out of range");
        }
    }

    #[test]
    fn test_caves_never_reach_the_surface_band() {
        let field = NoiseField::new(NoiseParams {
            cave_threshold: -1.0,
            cave_frequency: 0.1,
            ..NoiseParams::default()
        });
        let p = field.params().clone();
        // A threshold of -1 carves everything deep enough, so anything in
        // the surface band must still be solid.
        for x in 0..8 {
            let x = f64::from(x) * 5.0;
            let surface = field.surface_height(x, 0.0);
            let y = (surface - p.cave_min_depth * 0.5).max(p.cave_floor + 1.0);
            if surface - y > 0.0 && surface - y <= p.cave_min_depth {
                assert!(field.sample(DVec3::new(x, y, 0.0)) > 0.0);
            }
        }
    }
}
