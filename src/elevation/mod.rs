//! Elevation sampling boundary.
//!
//! The heightfield builder asks an [`ElevationSampler`] for absolute
//! elevations at a row-major grid of geographic points. Samplers may hit the
//! network; everything behind this trait is I/O, everything in front of it is
//! deterministic numeric code.

pub mod cache;
pub mod synthetic;

pub use cache::{CacheKey, CachedSampler, ElevationCache, MemoryCache};
pub use synthetic::SyntheticTerrain;

use crate::error::ElevationError;

/// Row-major grid of (lat, lon) query points
#[derive(Debug, Clone)]
pub struct SampleGrid {
    pub rows: usize,
    pub cols: usize,
    pub points: Vec<(f64, f64)>,
}

impl SampleGrid {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Absolute elevations in meters, row-major, with the shape the sampler claims
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationRaster {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl ElevationRaster {
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        Self { rows, cols, values }
    }

    /// Shape matches the request and the value count matches the shape
    pub fn matches(&self, grid: &SampleGrid) -> bool {
        self.rows == grid.rows
            && self.cols == grid.cols
            && self.values.len() == grid.rows * grid.cols
    }
}

/// Source of absolute elevation samples
pub trait ElevationSampler: Send + Sync {
    /// Short name for logs and cache keys
    fn name(&self) -> &str;

    /// Sample every point of `grid`. `zoom` is a web-map zoom level hinting at
    /// the detail the caller needs.
    fn sample(&self, grid: &SampleGrid, zoom: u8) -> Result<ElevationRaster, ElevationError>;
}

impl<S: ElevationSampler + ?Sized> ElevationSampler for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn sample(&self, grid: &SampleGrid, zoom: u8) -> Result<ElevationRaster, ElevationError> {
        (**self).sample(grid, zoom)
    }
}

/// Web-map zoom level whose 256px tiles resolve roughly `spacing_m` per pixel
/// at the given latitude.
pub fn zoom_for_spacing(spacing_m: f64, lat: f64) -> u8 {
    const EQUATOR_M: f64 = 40_075_016.686;
    if spacing_m <= 0.0 || !spacing_m.is_finite() {
        return 15;
    }
    let meters_per_pixel_z0 = EQUATOR_M * lat.to_radians().cos().abs() / 256.0;
    let zoom = (meters_per_pixel_z0 / spacing_m).log2().round();
    zoom.clamp(8.0, 15.0) as u8
}
