use geo::{BoundingRect, Contains, Coord, Polygon};

use super::heightfield::{GridSpec, Heightfield};
use crate::error::GeometryError;

/// Indices of the grid nodes strictly inside `polygon`
pub fn covered_samples(spec: &GridSpec, polygon: &Polygon<f64>) -> Vec<usize> {
    let Some(rect) = polygon.bounding_rect() else {
        return Vec::new();
    };
    let b = &spec.bounds;
    if rect.max().x < b.min_x || rect.min().x > b.max_x || rect.max().y < b.min_y || rect.min().y > b.max_y
    {
        return Vec::new();
    }

    let i0 = (((rect.min().x - b.min_x) / spec.dx).floor().max(0.0)) as usize;
    let i1 = (((rect.max().x - b.min_x) / spec.dx).ceil() as usize).min(spec.cols - 1);
    let j0 = (((rect.min().y - b.min_y) / spec.dy).floor().max(0.0)) as usize;
    let j1 = (((rect.max().y - b.min_y) / spec.dy).ceil() as usize).min(spec.rows - 1);

    let mut out = Vec::new();
    for j in j0..=j1 {
        for i in i0..=i1 {
            let (x, y) = spec.node_position(i, j);
            if polygon.contains(&Coord { x, y }) {
                out.push(spec.index(i, j));
            }
        }
    }
    out
}

/// How the single height under a flattened footprint is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Representative {
    Median,
    Quantile(f64),
    Minimum,
}

impl Representative {
    fn pick(&self, samples: &mut [f64]) -> f64 {
        samples.sort_by(|a, b| a.total_cmp(b));
        let q = match self {
            Representative::Median => 0.5,
            Representative::Quantile(q) => q.clamp(0.0, 1.0),
            Representative::Minimum => 0.0,
        };
        let idx = ((samples.len() - 1) as f64 * q).round() as usize;
        samples[idx]
    }
}

/// Set every covered sample to one representative height.
///
/// The height is picked from `source`, which shares the grid of `field`, so
/// footprints flattened one after another do not see each other's results.
/// Returns the height used. `locked` marks the touched samples.
pub fn flatten(
    field: &mut Heightfield,
    source: &Heightfield,
    polygon: &Polygon<f64>,
    representative: Representative,
    locked: &mut [bool],
) -> Result<f64, GeometryError> {
    let covered = covered_samples(source.spec(), polygon);
    if covered.is_empty() {
        return Err(GeometryError::NoCoverage);
    }
    let mut samples: Vec<f64> = covered.iter().map(|&idx| source.values()[idx]).collect();
    let height = representative.pick(&mut samples);
    let values = field.values_mut();
    for &idx in &covered {
        values[idx] = height;
        locked[idx] = true;
    }
    Ok(height)
}

/// Lower covered samples to `min(original) - depth`.
///
/// The minimum is read from `original` so overlapping water bodies do not dig
/// into each other's depressions and flattened banks do not move the water
/// level. Returns the original water surface height.
pub fn carve(
    field: &mut Heightfield,
    original: &Heightfield,
    polygon: &Polygon<f64>,
    depth: f64,
    locked: &mut [bool],
) -> Result<f64, GeometryError> {
    let covered = covered_samples(original.spec(), polygon);
    if covered.is_empty() {
        return Err(GeometryError::NoCoverage);
    }
    let surface = covered
        .iter()
        .map(|&idx| original.values()[idx])
        .fold(f64::INFINITY, f64::min);
    let bottom = surface - depth.max(0.0);
    let values = field.values_mut();
    for &idx in &covered {
        values[idx] = values[idx].min(bottom);
        locked[idx] = true;
    }
    Ok(surface)
}
