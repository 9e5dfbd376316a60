//! Planar polygon helpers on top of `geo`: buffering, boolean merges,
//! ring extraction, chunking and line/polygon overlap measurement.

use geo::{
    BooleanOps, Contains, Coord, Densify, Euclidean, Length, LineInterpolatePoint, LineString,
    MultiLineString, MultiPolygon, Polygon, Winding,
};

/// Minimum polygon area (m²) below which a footprint is treated as degenerate
pub const MIN_POLYGON_AREA: f64 = 1e-6;

/// Build a `geo` polygon from open or closed rings
pub fn to_polygon(outer: &[(f64, f64)], holes: &[Vec<(f64, f64)>]) -> Polygon<f64> {
    Polygon::new(
        line_string(outer),
        holes.iter().map(|h| line_string(h)).collect(),
    )
}

/// Open ring (closing point dropped) from a `geo` line string
pub fn open_ring(ring: &LineString<f64>) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = ring.coords().map(|c| (c.x, c.y)).collect();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

/// Outer ring (CCW) and holes (CW) of a polygon as open rings
pub fn polygon_rings(polygon: &Polygon<f64>) -> (Vec<(f64, f64)>, Vec<Vec<(f64, f64)>>) {
    let mut exterior = polygon.exterior().clone();
    exterior.make_ccw_winding();
    let holes = polygon
        .interiors()
        .iter()
        .map(|h| {
            let mut ring = h.clone();
            ring.make_cw_winding();
            open_ring(&ring)
        })
        .filter(|h| h.len() >= 3)
        .collect();
    (open_ring(&exterior), holes)
}

pub fn line_string(points: &[(f64, f64)]) -> LineString<f64> {
    points.iter().map(|&(x, y)| Coord { x, y }).collect()
}

/// Total length of a polyline
pub fn polyline_length(points: &[(f64, f64)]) -> f64 {
    line_string(points).length::<Euclidean>()
}

/// Polyline with every edge split so no piece is longer than `max_len`
pub fn densify_polyline(points: &[(f64, f64)], max_len: f64) -> Vec<(f64, f64)> {
    if points.len() < 2 || max_len <= 0.0 {
        return points.to_vec();
    }
    line_string(points)
        .densify::<Euclidean>(max_len)
        .coords()
        .map(|c| (c.x, c.y))
        .collect()
}

/// Polygon with every ring edge split so no piece is longer than `max_len`
pub fn densify_polygon(polygon: &Polygon<f64>, max_len: f64) -> Polygon<f64> {
    if max_len <= 0.0 {
        return polygon.clone();
    }
    polygon.densify::<Euclidean>(max_len)
}

/// Cut a polyline into consecutive pieces of at most `max_len` meters.
/// Neighbouring pieces share their cut point.
pub fn split_polyline(points: &[(f64, f64)], max_len: f64) -> Vec<Vec<(f64, f64)>> {
    let total = polyline_length(points);
    if points.len() < 2 || total <= 1e-9 {
        return Vec::new();
    }
    if max_len <= 0.0 || total <= max_len {
        return vec![points.to_vec()];
    }
    let mut pieces = Vec::new();
    let mut current = vec![points[0]];
    let mut walked = 0.0;
    for w in points.windows(2) {
        let (mut a, b) = (w[0], w[1]);
        let mut len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        while walked + len > max_len + 1e-9 {
            let t = (max_len - walked) / len;
            let cut = (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
            current.push(cut);
            pieces.push(std::mem::replace(&mut current, vec![cut]));
            len -= max_len - walked;
            walked = 0.0;
            a = cut;
        }
        walked += len;
        current.push(b);
    }
    if current.len() >= 2 && walked > 1e-9 {
        pieces.push(current);
    }
    pieces
}

/// Points every `spacing` meters along a polyline, excluding both end points
pub fn stations_along(points: &[(f64, f64)], spacing: f64) -> Vec<(f64, f64)> {
    let line = line_string(points);
    let total = line.length::<Euclidean>();
    if spacing <= 0.0 || total <= spacing {
        return Vec::new();
    }
    let count = (total / spacing).floor() as usize;
    // Center the stations so the first and last sit equally far from the ends
    let offset = (total - count as f64 * spacing) / 2.0;
    (0..=count)
        .map(|k| offset + k as f64 * spacing)
        .filter(|&d| d > 1e-9 && d < total - 1e-9)
        .filter_map(|d| line.line_interpolate_point(d / total))
        .map(|p| (p.x(), p.y()))
        .collect()
}

/// Buffer a polyline by `radius` with round joins and caps.
///
/// Each edge becomes a stadium (rectangle plus two half discs); the stadiums
/// are merged with a boolean union.
pub fn buffer_polyline(points: &[(f64, f64)], radius: f64, arc_segments: usize) -> MultiPolygon<f64> {
    if points.len() < 2 || radius <= 0.0 {
        return MultiPolygon::new(Vec::new());
    }
    let pieces: Vec<MultiPolygon<f64>> = points
        .windows(2)
        .filter_map(|w| stadium(w[0], w[1], radius, arc_segments.max(2)))
        .map(|p| MultiPolygon::new(vec![p]))
        .collect();
    union_all(pieces)
}

fn stadium(
    a: (f64, f64),
    b: (f64, f64),
    radius: f64,
    arc_segments: usize,
) -> Option<Polygon<f64>> {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-9 {
        return None;
    }
    let heading = dy.atan2(dx);
    let mut ring = Vec::with_capacity(2 * (arc_segments + 1));
    // Half disc around b, sweeping from the right side through the front
    for k in 0..=arc_segments {
        let ang = heading - std::f64::consts::FRAC_PI_2
            + std::f64::consts::PI * k as f64 / arc_segments as f64;
        ring.push((b.0 + radius * ang.cos(), b.1 + radius * ang.sin()));
    }
    // Half disc around a, from the left side through the back
    for k in 0..=arc_segments {
        let ang = heading
            + std::f64::consts::FRAC_PI_2
            + std::f64::consts::PI * k as f64 / arc_segments as f64;
        ring.push((a.0 + radius * ang.cos(), a.1 + radius * ang.sin()));
    }
    Some(to_polygon(&ring, &[]))
}

/// Union of many multipolygons, merged pairwise to keep operands balanced
pub fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    parts.retain(|p| !p.0.is_empty());
    if parts.is_empty() {
        return MultiPolygon::new(Vec::new());
    }
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// Length (meters) of the part of `line` that lies strictly inside `polygon`.
///
/// The line is clipped by the polygon; clipped edges that run along the
/// boundary are dropped, so a line that only touches the polygon contributes
/// nothing.
pub fn length_inside(polygon: &Polygon<f64>, line: &[(f64, f64)]) -> f64 {
    if line.len() < 2 {
        return 0.0;
    }
    let clipped = polygon.clip(&MultiLineString::new(vec![line_string(line)]), false);
    clipped
        .iter()
        .flat_map(|piece| piece.lines())
        .filter(|edge| {
            let mid = Coord {
                x: (edge.start.x + edge.end.x) / 2.0,
                y: (edge.start.y + edge.end.y) / 2.0,
            };
            polygon.contains(&mid)
        })
        .map(|edge| edge.length::<Euclidean>())
        .sum()
}
