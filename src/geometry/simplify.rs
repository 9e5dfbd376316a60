use geo::{LineString, Simplify};

/// Douglas-Peucker simplification of a local-frame polyline (meters)
pub fn simplify_polyline(points: &[(f64, f64)], epsilon: f64) -> Vec<(f64, f64)> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }

    let line: LineString<f64> = points
        .iter()
        .map(|&(x, y)| geo::coord! { x: x, y: y })
        .collect();

    let simplified = line.simplify(&epsilon);

    simplified.0.into_iter().map(|c| (c.x, c.y)).collect()
}

/// Simplification tolerance in meters for a given grid spacing.
///
/// Detail well below a grid cell cannot show up in the draped mesh anyway.
pub fn epsilon_for_spacing(spacing_m: f64) -> f64 {
    if spacing_m < 2.0 {
        0.5
    } else if spacing_m < 5.0 {
        1.0
    } else if spacing_m < 10.0 {
        2.0
    } else {
        spacing_m * 0.25
    }
}
