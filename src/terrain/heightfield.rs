use crate::config::model::MIN_GRID_SAMPLES;
use crate::error::TerrainError;
use crate::geometry::Bounds;

/// Placement and shape of a regular sample grid.
///
/// Nodes sit on the box edges: node `(0, 0)` is `(min_x, min_y)` and node
/// `(cols - 1, rows - 1)` is `(max_x, max_y)`. Zones that share an edge and a
/// spacing therefore share the node positions along that edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub bounds: Bounds,
    pub cols: usize,
    pub rows: usize,
    pub dx: f64,
    pub dy: f64,
}

impl GridSpec {
    /// Grid with `resolution` samples along the longer side and the shorter
    /// side scaled by the aspect ratio, so cells stay close to square.
    pub fn for_bounds(bounds: Bounds, resolution: usize) -> Result<Self, TerrainError> {
        if !bounds.is_valid() {
            return Err(TerrainError::InvalidBounds(format!("{:?}", bounds)));
        }
        let resolution = resolution.max(MIN_GRID_SAMPLES);
        let (w, h) = (bounds.width(), bounds.height());
        let (cols, rows) = if w >= h {
            let rows = ((resolution - 1) as f64 * h / w).round() as usize + 1;
            (resolution, rows.max(MIN_GRID_SAMPLES))
        } else {
            let cols = ((resolution - 1) as f64 * w / h).round() as usize + 1;
            (cols.max(MIN_GRID_SAMPLES), resolution)
        };
        Ok(Self {
            bounds,
            cols,
            rows,
            dx: w / (cols - 1) as f64,
            dy: h / (rows - 1) as f64,
        })
    }

    /// Same spacing, extended by `pad` cells on every side
    pub fn padded(&self, pad: usize) -> Self {
        let px = pad as f64 * self.dx;
        let py = pad as f64 * self.dy;
        Self {
            bounds: Bounds::new(
                self.bounds.min_x - px,
                self.bounds.min_y - py,
                self.bounds.max_x + px,
                self.bounds.max_y + py,
            ),
            cols: self.cols + 2 * pad,
            rows: self.rows + 2 * pad,
            dx: self.dx,
            dy: self.dy,
        }
    }

    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.cols + i
    }

    pub fn x_at(&self, i: usize) -> f64 {
        if i + 1 == self.cols {
            self.bounds.max_x
        } else {
            self.bounds.min_x + i as f64 * self.dx
        }
    }

    pub fn y_at(&self, j: usize) -> f64 {
        if j + 1 == self.rows {
            self.bounds.max_y
        } else {
            self.bounds.min_y + j as f64 * self.dy
        }
    }

    /// Local-frame position of node (i, j)
    pub fn node_position(&self, i: usize, j: usize) -> (f64, f64) {
        (self.x_at(i), self.y_at(j))
    }

    /// All node positions, row-major
    pub fn node_positions(&self) -> Vec<(f64, f64)> {
        let mut out = Vec::with_capacity(self.len());
        for j in 0..self.rows {
            for i in 0..self.cols {
                out.push(self.node_position(i, j));
            }
        }
        out
    }

    /// Larger of the two cell sizes
    pub fn spacing(&self) -> f64 {
        self.dx.max(self.dy)
    }
}

/// How a grid cell is split into two triangles.
///
/// Cell (i, j) has corners p00 = (i, j), p10 = (i+1, j), p01 = (i, j+1) and
/// p11 = (i+1, j+1). It is cut along the p10–p01 diagonal into the lower
/// triangle (p00, p10, p01) and the upper triangle (p11, p01, p10), both
/// counter-clockwise seen from above. Mesh building and interpolation both go
/// through this function so they can never disagree.
pub fn cell_triangles(i: usize, j: usize) -> [[(usize, usize); 3]; 2] {
    [
        [(i, j), (i + 1, j), (i, j + 1)],
        [(i + 1, j + 1), (i, j + 1), (i + 1, j)],
    ]
}

/// Row-major grid of heights in model units
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    spec: GridSpec,
    values: Vec<f64>,
}

impl Heightfield {
    pub fn new(spec: GridSpec, values: Vec<f64>) -> Self {
        debug_assert_eq!(spec.len(), values.len());
        Self { spec, values }
    }

    pub fn filled(spec: GridSpec, value: f64) -> Self {
        Self::new(spec, vec![value; spec.len()])
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[self.spec.index(i, j)]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.spec.index(i, j);
        self.values[idx] = value;
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn range(&self) -> f64 {
        self.max() - self.min()
    }

    /// Drop `pad` cells from every side
    pub fn crop(&self, pad: usize) -> Heightfield {
        if pad == 0 {
            return self.clone();
        }
        let inner = GridSpec {
            bounds: Bounds::new(
                self.spec.x_at(pad),
                self.spec.y_at(pad),
                self.spec.x_at(self.spec.cols - 1 - pad),
                self.spec.y_at(self.spec.rows - 1 - pad),
            ),
            cols: self.spec.cols - 2 * pad,
            rows: self.spec.rows - 2 * pad,
            dx: self.spec.dx,
            dy: self.spec.dy,
        };
        let mut values = Vec::with_capacity(inner.len());
        for j in pad..self.spec.rows - pad {
            let start = self.spec.index(pad, j);
            values.extend_from_slice(&self.values[start..start + inner.cols]);
        }
        Heightfield::new(inner, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_preserves_aspect() {
        let spec = GridSpec::for_bounds(Bounds::new(0.0, 0.0, 2000.0, 1000.0), 101).unwrap();
        assert_eq!(spec.cols, 101);
        assert_eq!(spec.rows, 51);
        assert!((spec.dx - spec.dy).abs() < 1e-9);
    }

    #[test]
    fn test_grid_minimum_samples() {
        let spec = GridSpec::for_bounds(Bounds::new(0.0, 0.0, 1000.0, 10.0), 50).unwrap();
        assert_eq!(spec.rows, 10);
        let spec = GridSpec::for_bounds(Bounds::new(0.0, 0.0, 10.0, 10.0), 3).unwrap();
        assert_eq!((spec.cols, spec.rows), (10, 10));
    }

    #[test]
    fn test_grid_rejects_empty_bounds() {
        let err = GridSpec::for_bounds(Bounds::new(0.0, 0.0, 0.0, 10.0), 50).unwrap_err();
        assert!(matches!(err, TerrainError::InvalidBounds(_)));
    }

    #[test]
    fn test_nodes_hit_bounds_exactly() {
        let spec = GridSpec::for_bounds(Bounds::new(-500.0, -300.0, 700.0, 900.0), 37).unwrap();
        assert_eq!(spec.node_position(0, 0), (-500.0, -300.0));
        assert_eq!(spec.node_position(spec.cols - 1, spec.rows - 1), (700.0, 900.0));
    }

    #[test]
    fn test_padding_and_crop() {
        let spec = GridSpec::for_bounds(Bounds::new(0.0, 0.0, 90.0, 90.0), 10).unwrap();
        let padded = spec.padded(2);
        assert_eq!(padded.cols, 14);
        assert!((padded.bounds.min_x + 20.0).abs() < 1e-9);

        let values: Vec<f64> = (0..padded.len()).map(|v| v as f64).collect();
        let field = Heightfield::new(padded, values);
        let cropped = field.crop(2);
        assert_eq!(cropped.spec().cols, 10);
        assert_eq!(cropped.get(0, 0), field.get(2, 2));
        assert!((cropped.spec().bounds.max_x - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_cell_triangles_cover_cell() {
        let [lower, upper] = cell_triangles(3, 4);
        assert_eq!(lower, [(3, 4), (4, 4), (3, 5)]);
        assert_eq!(upper, [(4, 5), (3, 5), (4, 4)]);
    }
}
