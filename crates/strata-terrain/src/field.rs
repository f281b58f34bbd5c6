//! The scalar-field service consumed by chunk generation.

use glam::DVec3;

/// A density field sampled at world positions.
///
/// Positive values are inside the terrain, zero and below are open space. The
/// magnitude is the distance below the surface, in blocks, for fields that
/// are height-based.
pub trait ScalarField: Send + Sync {
    /// Density at `position`.
    fn sample(&self, position: DVec3) -> f64;
}

impl<F> ScalarField for F
where
    F: Fn(DVec3) -> f64 + Send + Sync,
{
    fn sample(&self, position: DVec3) -> f64 {
        self(position)
    }
}
