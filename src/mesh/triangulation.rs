use std::collections::HashMap;

use earcutr::earcut;

/// Triangulate a polygon with holes. Returned faces index into the outer ring
/// followed by each hole, and are counter-clockwise seen from above.
pub fn triangulate_polygon(outer: &[(f64, f64)], holes: &[Vec<(f64, f64)>]) -> Vec<[usize; 3]> {
    if outer.len() < 3 {
        return Vec::new();
    }

    let mut vertices: Vec<f64> =
        Vec::with_capacity((outer.len() + holes.iter().map(|h| h.len()).sum::<usize>()) * 2);
    let mut hole_indices: Vec<usize> = Vec::with_capacity(holes.len());

    for &(x, y) in outer {
        vertices.push(x);
        vertices.push(y);
    }

    for hole in holes {
        hole_indices.push(vertices.len() / 2);
        for &(x, y) in hole {
            vertices.push(x);
            vertices.push(y);
        }
    }

    let indices = earcut(&vertices, &hole_indices, 2).unwrap_or_default();
    let point = |i: usize| (vertices[2 * i], vertices[2 * i + 1]);

    indices
        .chunks_exact(3)
        .map(|tri| {
            let (a, b, c) = (point(tri[0]), point(tri[1]), point(tri[2]));
            let cross = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
            if cross < 0.0 {
                [tri[0], tri[2], tri[1]]
            } else {
                [tri[0], tri[1], tri[2]]
            }
        })
        .collect()
}

/// Split triangles until no edge is longer than `max_len`.
///
/// Each pass splits every over-long edge at its midpoint; both triangles on
/// an edge see the same midpoint, so the result has no T-junctions. Boundary
/// edges already shorter than `max_len` are never touched.
pub fn refine_to_edge_length(
    points: &mut Vec<(f64, f64)>,
    mut faces: Vec<[usize; 3]>,
    max_len: f64,
    max_passes: usize,
) -> Vec<[usize; 3]> {
    if max_len <= 0.0 {
        return faces;
    }
    let limit = max_len * max_len;

    for _ in 0..max_passes {
        let len2 = |a: usize, b: usize, points: &[(f64, f64)]| {
            let (p, q) = (points[a], points[b]);
            (p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)
        };

        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        for f in &faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                let key = (a.min(b), a.max(b));
                if !midpoints.contains_key(&key) && len2(a, b, points) > limit {
                    let (p, q) = (points[a], points[b]);
                    points.push(((p.0 + q.0) * 0.5, (p.1 + q.1) * 0.5));
                    midpoints.insert(key, points.len() - 1);
                }
            }
        }
        if midpoints.is_empty() {
            break;
        }

        let mid = |a: usize, b: usize| midpoints.get(&(a.min(b), a.max(b))).copied();
        let mut next = Vec::with_capacity(faces.len() * 2);
        for f in faces {
            // rotate so the split edges come first
            let mut rotated = f;
            for _ in 0..3 {
                let [a, b, c] = rotated;
                if mid(a, b).is_some() && (mid(c, a).is_none() || mid(b, c).is_some()) {
                    break;
                }
                rotated = [b, c, a];
            }
            let [a, b, c] = rotated;
            match (mid(a, b), mid(b, c), mid(c, a)) {
                (Some(ab), Some(bc), Some(ca)) => {
                    next.push([a, ab, ca]);
                    next.push([ab, b, bc]);
                    next.push([ca, bc, c]);
                    next.push([ab, bc, ca]);
                }
                (Some(ab), Some(bc), None) => {
                    next.push([ab, b, bc]);
                    next.push([a, ab, bc]);
                    next.push([a, bc, c]);
                }
                (Some(ab), None, None) => {
                    next.push([a, ab, c]);
                    next.push([ab, b, c]);
                }
                _ => next.push([a, b, c]),
            }
        }
        faces = next;
    }
    faces
}
