use super::heightfield::Heightfield;

/// Fractional grid coordinates closer than this to a node snap onto it
const NODE_SNAP: f64 = 1e-9;

/// Read-only height lookup over a finished heightfield.
///
/// Inside a cell the surface is the plane of whichever triangle of
/// [`cell_triangles`](super::heightfield::cell_triangles) contains the point,
/// so the answer matches the terrain mesh exactly, including at every grid
/// vertex. Points outside the grid are clamped onto its edge.
#[derive(Debug, Clone)]
pub struct SurfaceInterpolator {
    field: Heightfield,
}

impl SurfaceInterpolator {
    pub fn new(field: Heightfield) -> Self {
        Self { field }
    }

    pub fn field(&self) -> &Heightfield {
        &self.field
    }

    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let spec = self.field.spec();
        let u = grid_coordinate(x, spec.bounds.min_x, spec.dx, spec.cols);
        let v = grid_coordinate(y, spec.bounds.min_y, spec.dy, spec.rows);

        if u.fract() == 0.0 && v.fract() == 0.0 {
            return self.field.get(u as usize, v as usize);
        }

        let i = (u.floor() as usize).min(spec.cols - 2);
        let j = (v.floor() as usize).min(spec.rows - 2);
        let fx = u - i as f64;
        let fy = v - j as f64;

        let h00 = self.field.get(i, j);
        let h10 = self.field.get(i + 1, j);
        let h01 = self.field.get(i, j + 1);
        let h11 = self.field.get(i + 1, j + 1);

        if fx + fy <= 1.0 {
            // lower triangle (p00, p10, p01)
            h00 + (h10 - h00) * fx + (h01 - h00) * fy
        } else {
            // upper triangle (p11, p01, p10)
            h11 + (h01 - h11) * (1.0 - fx) + (h10 - h11) * (1.0 - fy)
        }
    }

    pub fn heights_at(&self, points: &[(f64, f64)]) -> Vec<f64> {
        points.iter().map(|&(x, y)| self.height_at(x, y)).collect()
    }

    /// Largest height at the given points
    pub fn max_along(&self, points: &[(f64, f64)]) -> Option<f64> {
        points
            .iter()
            .map(|&(x, y)| self.height_at(x, y))
            .reduce(f64::max)
    }
}

/// Clamped, node-snapped fractional index along one axis
fn grid_coordinate(value: f64, min: f64, step: f64, count: usize) -> f64 {
    let max = (count - 1) as f64;
    let t = ((value - min) / step).clamp(0.0, max);
    let nearest = t.round();
    if (t - nearest).abs() < NODE_SNAP {
        nearest
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::terrain::heightfield::{GridSpec, cell_triangles};

    fn bumpy() -> Heightfield {
        let spec = GridSpec::for_bounds(Bounds::new(-50.0, -30.0, 50.0, 70.0), 12).unwrap();
        let values = (0..spec.len())
            .map(|k| ((k * 7919) % 13) as f64 * 0.37 - 1.0)
            .collect();
        Heightfield::new(spec, values)
    }

    #[test]
    fn test_exact_at_every_vertex() {
        let field = bumpy();
        let interp = SurfaceInterpolator::new(field.clone());
        let spec = *field.spec();
        for j in 0..spec.rows {
            for i in 0..spec.cols {
                let (x, y) = spec.node_position(i, j);
                assert_eq!(interp.height_at(x, y), field.get(i, j), "node ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_matches_mesh_triangle_planes() {
        let field = bumpy();
        let interp = SurfaceInterpolator::new(field.clone());
        let spec = *field.spec();
        let (i, j) = (4, 6);
        for tri in cell_triangles(i, j) {
            // centroid of each mesh triangle
            let mut c = (0.0, 0.0, 0.0);
            for &(a, b) in &tri {
                let (x, y) = spec.node_position(a, b);
                c.0 += x / 3.0;
                c.1 += y / 3.0;
                c.2 += field.get(a, b) / 3.0;
            }
            assert!((interp.height_at(c.0, c.1) - c.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_clamps_outside() {
        let field = bumpy();
        let interp = SurfaceInterpolator::new(field.clone());
        let spec = *field.spec();
        assert_eq!(interp.height_at(-1000.0, -1000.0), field.get(0, 0));
        assert_eq!(
            interp.height_at(1000.0, 1000.0),
            field.get(spec.cols - 1, spec.rows - 1)
        );
    }

    #[test]
    fn test_linear_along_edge() {
        let field = bumpy();
        let interp = SurfaceInterpolator::new(field.clone());
        let spec = *field.spec();
        let x = spec.bounds.max_x;
        let y = spec.y_at(2) + 0.25 * spec.dy;
        let expected = field.get(spec.cols - 1, 2) * 0.75 + field.get(spec.cols - 1, 3) * 0.25;
        assert!((interp.height_at(x, y) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_heights_at_batch() {
        let interp = SurfaceInterpolator::new(bumpy());
        let pts = [(0.0, 0.0), (10.0, 5.0)];
        let hs = interp.heights_at(&pts);
        assert_eq!(hs, vec![interp.height_at(0.0, 0.0), interp.height_at(10.0, 5.0)]);
        assert_eq!(interp.max_along(&pts), Some(hs[0].max(hs[1])));
    }
}
