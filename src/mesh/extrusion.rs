use super::IndexedMesh;
use super::triangulation::{refine_to_edge_length, triangulate_polygon};
use crate::error::GeometryError;

/// Triangles smaller than this (m²) are dropped from extrusion walls
pub const MIN_WALL_AREA: f64 = 1e-9;

/// Refinement passes for draped tops
const MAX_REFINE_PASSES: usize = 12;

/// Extrude a polygon between two height functions.
///
/// The top face is triangulated, refined so no edge exceeds `max_edge` (when
/// given), and every vertex gets `top(x, y)`. The bottom is the same
/// triangulation at `bottom(x, y)`, and walls follow the outer ring and every
/// hole. With constant functions this is a plain prism.
pub fn extrude_polygon(
    outer: &[(f64, f64)],
    holes: &[Vec<(f64, f64)>],
    top: impl Fn(f64, f64) -> f64,
    bottom: impl Fn(f64, f64) -> f64,
    max_edge: Option<f64>,
) -> Result<IndexedMesh, GeometryError> {
    if outer.len() < 3 {
        return Err(GeometryError::Degenerate("fewer than three vertices"));
    }

    let mut points: Vec<(f64, f64)> = outer.to_vec();
    for hole in holes {
        points.extend(hole.iter().copied());
    }
    if points.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
        return Err(GeometryError::Degenerate("non-finite coordinate"));
    }

    let mut faces = triangulate_polygon(outer, holes);
    if faces.is_empty() {
        return Err(GeometryError::Empty);
    }
    if let Some(max_len) = max_edge {
        faces = refine_to_edge_length(&mut points, faces, max_len, MAX_REFINE_PASSES);
    }

    let sheet = IndexedMesh {
        vertices: points.iter().map(|&(x, y)| [x, y, top(x, y)]).collect(),
        faces: faces
            .iter()
            .map(|f| [f[0] as u32, f[1] as u32, f[2] as u32])
            .collect(),
    };
    Ok(sheet.solidify(|v| bottom(v[0], v[1]), MIN_WALL_AREA))
}

/// Flat-topped prism between two constant heights
pub fn extrude_flat(
    outer: &[(f64, f64)],
    holes: &[Vec<(f64, f64)>],
    z_bottom: f64,
    z_top: f64,
) -> Result<IndexedMesh, GeometryError> {
    extrude_polygon(outer, holes, |_, _| z_top, |_, _| z_bottom, None)
}
