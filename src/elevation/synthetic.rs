use std::f64::consts::TAU;

use super::{ElevationRaster, ElevationSampler, SampleGrid};
use crate::error::ElevationError;

/// Meters per degree used to turn lat/lon into a pattern coordinate
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Procedural terrain defined on geographic coordinates.
///
/// The height at a point depends only on its lat/lon, so two zones asking for
/// the same location always get the same answer. Used offline and as the
/// fallback when a remote sampler fails.
#[derive(Debug, Clone)]
pub struct SyntheticTerrain {
    /// Mean elevation in meters
    pub base: f64,
    /// Peak deviation from the mean in meters
    pub amplitude: f64,
    /// Dominant feature size in meters
    pub wavelength: f64,
}

impl Default for SyntheticTerrain {
    fn default() -> Self {
        Self {
            base: 100.0,
            amplitude: 25.0,
            wavelength: 1500.0,
        }
    }
}

impl SyntheticTerrain {
    pub fn new(base: f64, amplitude: f64, wavelength: f64) -> Self {
        Self {
            base,
            amplitude,
            wavelength: wavelength.max(1.0),
        }
    }

    /// Perfectly flat terrain at `elevation`
    pub fn flat(elevation: f64) -> Self {
        Self::new(elevation, 0.0, 1.0)
    }

    pub fn elevation(&self, lat: f64, lon: f64) -> f64 {
        if self.amplitude == 0.0 {
            return self.base;
        }
        let x = lon * METERS_PER_DEGREE / self.wavelength;
        let y = lat * METERS_PER_DEGREE / self.wavelength;
        let ridges = (x * TAU).sin() * (y * TAU).cos();
        let hills = ((x + y) * TAU * 0.37).sin() * 0.5 + ((x - 0.6 * y) * TAU * 2.3).cos() * 0.15;
        self.base + self.amplitude * (0.6 * ridges + 0.4 * hills)
    }
}

impl ElevationSampler for SyntheticTerrain {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn sample(&self, grid: &SampleGrid, _zoom: u8) -> Result<ElevationRaster, ElevationError> {
        let values = grid
            .points
            .iter()
            .map(|&(lat, lon)| self.elevation(lat, lon))
            .collect();
        Ok(ElevationRaster::new(grid.rows, grid.cols, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_terrain() {
        let terrain = SyntheticTerrain::flat(42.0);
        assert_eq!(terrain.elevation(10.0, 20.0), 42.0);
        assert_eq!(terrain.elevation(-33.0, 151.0), 42.0);
    }

    #[test]
    fn test_deterministic_and_bounded() {
        let terrain = SyntheticTerrain::default();
        let a = terrain.elevation(47.3769, 8.5417);
        let b = terrain.elevation(47.3769, 8.5417);
        assert_eq!(a, b);
        for i in 0..100 {
            let h = terrain.elevation(47.0 + i as f64 * 0.001, 8.5);
            assert!(h >= terrain.base - terrain.amplitude * 1.25);
            assert!(h <= terrain.base + terrain.amplitude * 1.25);
        }
    }

    #[test]
    fn test_sample_shape() {
        let terrain = SyntheticTerrain::default();
        let grid = SampleGrid {
            rows: 3,
            cols: 4,
            points: vec![(47.0, 8.0); 12],
        };
        let raster = terrain.sample(&grid, 12).unwrap();
        assert!(raster.matches(&grid));
    }
}
