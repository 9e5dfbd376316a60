use std::collections::HashMap;

use super::Triangle;

/// Triangle mesh with shared vertices, in local meters and model heights.
///
/// Faces are counter-clockwise seen from outside. Topology queries
/// (boundaries, watertightness) work on vertex indices, so callers that build
/// meshes from separately computed pieces weld first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedMesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, v: [f64; 3]) -> u32 {
        self.vertices.push(v);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_face(&mut self, a: u32, b: u32, c: u32) {
        self.faces.push([a, b, c]);
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn min_z(&self) -> Option<f64> {
        self.referenced()
            .map(|i| self.vertices[i as usize][2])
            .reduce(f64::min)
    }

    pub fn max_z(&self) -> Option<f64> {
        self.referenced()
            .map(|i| self.vertices[i as usize][2])
            .reduce(f64::max)
    }

    fn referenced(&self) -> impl Iterator<Item = u32> + '_ {
        self.faces.iter().flat_map(|f| f.iter().copied())
    }

    pub fn face_area(&self, face: &[u32; 3]) -> f64 {
        let [a, b, c] = face.map(|i| self.vertices[i as usize]);
        let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let cx = u[1] * v[2] - u[2] * v[1];
        let cy = u[2] * v[0] - u[0] * v[2];
        let cz = u[0] * v[1] - u[1] * v[0];
        0.5 * (cx * cx + cy * cy + cz * cz).sqrt()
    }

    /// Drop faces with repeated indices or an area below `min_area`
    pub fn remove_degenerate(&mut self, min_area: f64) -> usize {
        let before = self.faces.len();
        let faces = std::mem::take(&mut self.faces);
        self.faces = faces
            .into_iter()
            .filter(|f| f[0] != f[1] && f[1] != f[2] && f[0] != f[2])
            .filter(|f| self.face_area(f) >= min_area)
            .collect();
        before - self.faces.len()
    }

    /// Half-edges that have no opposite twin, as a map from start vertex to
    /// end vertices.
    fn open_half_edges(&self) -> HashMap<u32, Vec<u32>> {
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for f in &self.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                *directed.entry((a, b)).or_insert(0) += 1;
            }
        }
        let mut open: HashMap<u32, Vec<u32>> = HashMap::new();
        for (&(a, b), &count) in &directed {
            let twins = directed.get(&(b, a)).copied().unwrap_or(0);
            for _ in twins..count {
                open.entry(a).or_default().push(b);
            }
        }
        for ends in open.values_mut() {
            ends.sort_unstable();
        }
        open
    }

    /// Boundary chains as ordered vertex lists, each flagged as closed or
    /// not. Each consecutive pair `(a, b)` is a face edge with nothing on the
    /// other side; chains follow face winding, so the outer boundary of a
    /// sheet seen from above runs counter-clockwise.
    pub fn boundary_chains(&self) -> Vec<(Vec<u32>, bool)> {
        let mut open = self.open_half_edges();
        let mut starts: Vec<u32> = open.keys().copied().collect();
        starts.sort_unstable();

        let mut chains = Vec::new();
        for start in starts {
            while let Some(mut next) = open.get_mut(&start).and_then(Vec::pop) {
                let mut ring = vec![start];
                let mut closed = true;
                while next != start {
                    ring.push(next);
                    match open.get_mut(&next).and_then(Vec::pop) {
                        Some(n) => next = n,
                        None => {
                            closed = false;
                            break;
                        }
                    }
                }
                chains.push((ring, closed));
            }
        }
        chains
    }

    /// Closed boundary loops only
    pub fn boundary_loops(&self) -> Vec<Vec<u32>> {
        self.boundary_chains()
            .into_iter()
            .filter_map(|(ring, closed)| closed.then_some(ring))
            .collect()
    }

    /// Every undirected edge is shared by exactly two faces with opposite
    /// directions. Vertices are welded with `tolerance` before checking.
    pub fn is_watertight(&self, tolerance: f64) -> bool {
        let welded = self.welded(tolerance);
        if welded.faces.is_empty() {
            return false;
        }
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for f in &welded.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                *directed.entry((a, b)).or_insert(0) += 1;
            }
        }
        directed
            .iter()
            .all(|(&(a, b), &count)| count == 1 && directed.get(&(b, a)) == Some(&1))
    }

    /// Merge vertices closer than `tolerance` and drop faces that collapse
    pub fn welded(&self, tolerance: f64) -> IndexedMesh {
        let tol = tolerance.max(f64::EPSILON);
        let cell = |v: &[f64; 3]| {
            (
                (v[0] / tol).floor() as i64,
                (v[1] / tol).floor() as i64,
                (v[2] / tol).floor() as i64,
            )
        };

        let mut buckets: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
        let mut remap = Vec::with_capacity(self.vertices.len());
        let mut vertices: Vec<[f64; 3]> = Vec::new();

        for v in &self.vertices {
            let (cx, cy, cz) = cell(v);
            let mut found = None;
            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(candidates) = buckets.get(&(cx + dx, cy + dy, cz + dz)) {
                            for &idx in candidates {
                                let w = vertices[idx as usize];
                                let d2 = (w[0] - v[0]).powi(2)
                                    + (w[1] - v[1]).powi(2)
                                    + (w[2] - v[2]).powi(2);
                                if d2 <= tol * tol {
                                    found = Some(idx);
                                    break 'search;
                                }
                            }
                        }
                    }
                }
            }
            let idx = match found {
                Some(idx) => idx,
                None => {
                    vertices.push(*v);
                    let idx = (vertices.len() - 1) as u32;
                    buckets.entry((cx, cy, cz)).or_default().push(idx);
                    idx
                }
            };
            remap.push(idx);
        }

        let faces = self
            .faces
            .iter()
            .map(|f| f.map(|i| remap[i as usize]))
            .filter(|f| f[0] != f[1] && f[1] != f[2] && f[0] != f[2])
            .collect();
        IndexedMesh { vertices, faces }
    }

    /// Close every boundary loop with a fan around its centroid. Returns the
    /// number of loops filled.
    pub fn fill_holes(&mut self) -> usize {
        let loops = self.boundary_loops();
        let mut filled = 0;
        for ring in loops.into_iter().filter(|r| r.len() >= 3) {
            let n = ring.len() as f64;
            let mut c = [0.0; 3];
            for &i in &ring {
                let v = self.vertices[i as usize];
                c[0] += v[0] / n;
                c[1] += v[1] / n;
                c[2] += v[2] / n;
            }
            let center = self.add_vertex(c);
            for k in 0..ring.len() {
                let a = ring[k];
                let b = ring[(k + 1) % ring.len()];
                // Boundary half-edge a->b belongs to an existing face; the
                // patch uses b->a.
                self.add_face(b, a, center);
            }
            filled += 1;
        }
        filled
    }

    /// Turn an open sheet into a closed solid.
    ///
    /// The sheet is kept as the top, a copy with every vertex moved to
    /// `bottom(vertex)` and reversed winding becomes the bottom, and wall
    /// strips follow each boundary loop in order. Wall triangles with an
    /// area below `min_area` are dropped.
    pub fn solidify(&self, bottom: impl Fn(&[f64; 3]) -> f64, min_area: f64) -> IndexedMesh {
        let n = self.vertices.len() as u32;
        let mut out = IndexedMesh {
            vertices: Vec::with_capacity(self.vertices.len() * 2),
            faces: Vec::with_capacity(self.faces.len() * 2),
        };
        out.vertices.extend_from_slice(&self.vertices);
        out.vertices
            .extend(self.vertices.iter().map(|v| [v[0], v[1], bottom(v)]));

        out.faces.extend_from_slice(&self.faces);
        out.faces
            .extend(self.faces.iter().map(|f| [f[0] + n, f[2] + n, f[1] + n]));

        for (ring, closed) in self.boundary_chains() {
            let edges = if closed { ring.len() } else { ring.len() - 1 };
            for k in 0..edges {
                let a = ring[k];
                let b = ring[(k + 1) % ring.len()];
                for face in [[b, a, a + n], [b, a + n, b + n]] {
                    if out.face_area(&face) >= min_area {
                        out.faces.push(face);
                    }
                }
            }
        }
        out
    }

    /// Expand into output triangles
    pub fn to_triangles(&self) -> Vec<Triangle> {
        self.faces
            .iter()
            .map(|f| {
                Triangle::from_f64(
                    self.vertices[f[0] as usize],
                    self.vertices[f[1] as usize],
                    self.vertices[f[2] as usize],
                )
            })
            .collect()
    }
}
