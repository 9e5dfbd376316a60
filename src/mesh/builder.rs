/// What a mesh represents. Downstream writers pick file names and materials
/// from this instead of guessing from the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshRole {
    /// Closed terrain solid of one zone
    Terrain,
    /// Roads draped on the terrain
    GroundRoads,
    /// Elevated bridge decks
    BridgeDecks,
    /// Pillars under bridge decks
    Supports,
}

impl MeshRole {
    /// Suffix used in output file names
    pub fn file_suffix(&self) -> &'static str {
        match self {
            MeshRole::Terrain => "terrain",
            MeshRole::GroundRoads => "roads",
            MeshRole::BridgeDecks => "bridges",
            MeshRole::Supports => "supports",
        }
    }
}

/// A triangle in output precision
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Three vertices: [[x, y, z], [x, y, z], [x, y, z]]
    pub vertices: [[f32; 3]; 3],
    /// Normal vector [nx, ny, nz]
    pub normal: [f32; 3],
}

impl Triangle {
    /// Create a new triangle and calculate its normal
    pub fn new(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> Self {
        let normal = calculate_normal(v0, v1, v2);
        Self {
            vertices: [v0, v1, v2],
            normal,
        }
    }

    /// Narrow a double precision triangle
    pub fn from_f64(v0: [f64; 3], v1: [f64; 3], v2: [f64; 3]) -> Self {
        let narrow = |v: [f64; 3]| [v[0] as f32, v[1] as f32, v[2] as f32];
        Self::new(narrow(v0), narrow(v1), narrow(v2))
    }

    pub fn min_z(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v[2])
            .fold(f32::INFINITY, f32::min)
    }

    pub fn max_z(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v[2])
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Apply `f` to every vertex and recompute the normal
    pub fn map_vertices(&self, f: impl Fn([f32; 3]) -> [f32; 3]) -> Self {
        Self::new(
            f(self.vertices[0]),
            f(self.vertices[1]),
            f(self.vertices[2]),
        )
    }
}

/// Calculate the normal vector for a triangle using the cross product
pub(crate) fn calculate_normal(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> [f32; 3] {
    // Edge vectors
    let u = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let v = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

    let nx = u[1] * v[2] - u[2] * v[1];
    let ny = u[2] * v[0] - u[0] * v[2];
    let nz = u[0] * v[1] - u[1] * v[0];

    let len = (nx * nx + ny * ny + nz * nz).sqrt();
    if len > 1e-10 {
        [nx / len, ny / len, nz / len]
    } else {
        [0.0, 0.0, 1.0] // Default to up for degenerate triangles
    }
}

/// Triangles plus the role they play in the zone output
#[derive(Debug, Clone)]
pub struct TaggedMesh {
    pub role: MeshRole,
    pub triangles: Vec<Triangle>,
}

impl TaggedMesh {
    pub fn new(role: MeshRole, triangles: Vec<Triangle>) -> Self {
        Self { role, triangles }
    }

    pub fn empty(role: MeshRole) -> Self {
        Self::new(role, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Lowest vertex height, `None` for an empty mesh
    pub fn min_z(&self) -> Option<f32> {
        self.triangles.iter().map(Triangle::min_z).reduce(f32::min)
    }
}

/// Accumulator for building triangle meshes of one role
#[derive(Debug)]
pub struct MeshBuilder {
    role: MeshRole,
    triangles: Vec<Triangle>,
}

impl MeshBuilder {
    pub fn new(role: MeshRole) -> Self {
        Self {
            role,
            triangles: Vec::new(),
        }
    }

    /// Add a triangle from three vertices
    pub fn add_triangle(&mut self, v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) {
        self.triangles.push(Triangle::new(v0, v1, v2));
    }

    /// Add triangles from another collection
    pub fn extend(&mut self, triangles: impl IntoIterator<Item = Triangle>) {
        self.triangles.extend(triangles);
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn finish(self) -> TaggedMesh {
        TaggedMesh::new(self.role, self.triangles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_normal() {
        // A triangle in the XY plane should have a Z-pointing normal
        let tri = Triangle::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);

        assert!((tri.normal[0]).abs() < 0.001);
        assert!((tri.normal[1]).abs() < 0.001);
        assert!((tri.normal[2] - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_mesh_builder_keeps_role() {
        let mut builder = MeshBuilder::new(MeshRole::BridgeDecks);
        builder.add_triangle([0.0, 0.0, 5.0], [1.0, 0.0, 5.0], [0.0, 1.0, 6.0]);
        builder.extend(vec![Triangle::from_f64(
            [0.0, 0.0, 2.0],
            [1.0, 0.0, 2.0],
            [0.0, 1.0, 2.0],
        )]);
        assert_eq!(builder.len(), 2);

        let mesh = builder.finish();
        assert_eq!(mesh.role, MeshRole::BridgeDecks);
        assert_eq!(mesh.min_z(), Some(2.0));
        assert_eq!(mesh.role.file_suffix(), "bridges");
    }

    #[test]
    fn test_empty_mesh_has_no_min() {
        assert_eq!(TaggedMesh::empty(MeshRole::Supports).min_z(), None);
    }
}
