use super::heightfield::{Heightfield, cell_triangles};
use crate::config::SolidConfig;
use crate::mesh::extrusion::MIN_WALL_AREA;
use crate::mesh::{IndexedMesh, MeshRole, TaggedMesh};

/// Closed terrain solid of one zone
#[derive(Debug, Clone)]
pub struct TerrainMesh {
    pub mesh: IndexedMesh,
    /// Height of the flat bottom
    pub bottom: f64,
    pub watertight: bool,
}

impl TerrainMesh {
    pub fn role(&self) -> MeshRole {
        MeshRole::Terrain
    }

    pub fn to_tagged(&self) -> TaggedMesh {
        TaggedMesh::new(self.role(), self.mesh.to_triangles())
    }
}

/// Open top surface of a heightfield: one vertex per node, two faces per cell
pub fn surface_mesh(field: &Heightfield) -> IndexedMesh {
    let spec = field.spec();
    let mut mesh = IndexedMesh {
        vertices: Vec::with_capacity(spec.len()),
        faces: Vec::with_capacity((spec.cols - 1) * (spec.rows - 1) * 2),
    };
    for j in 0..spec.rows {
        for i in 0..spec.cols {
            let (x, y) = spec.node_position(i, j);
            mesh.vertices.push([x, y, field.get(i, j)]);
        }
    }
    for j in 0..spec.rows - 1 {
        for i in 0..spec.cols - 1 {
            for tri in cell_triangles(i, j) {
                mesh.faces.push(tri.map(|(a, b)| spec.index(a, b) as u32));
            }
        }
    }
    mesh
}

/// Turns a heightfield into a watertight solid with a flat bottom
pub struct SolidMeshBuilder<'a> {
    config: &'a SolidConfig,
    floor: Option<f64>,
}

impl<'a> SolidMeshBuilder<'a> {
    pub fn new(config: &'a SolidConfig) -> Self {
        Self {
            config,
            floor: None,
        }
    }

    /// Lowest surface height shared by a group of zones. Zones built with the
    /// same floor get the same bottom plane.
    pub fn with_floor(mut self, floor: Option<f64>) -> Self {
        self.floor = floor;
        self
    }

    pub fn build(&self, field: &Heightfield) -> TerrainMesh {
        let lowest = match self.floor {
            Some(floor) => floor.min(field.min()),
            None => field.min(),
        };
        let bottom = lowest - self.config.base_thickness.max(0.0);
        let top = surface_mesh(field);
        let mut mesh = top.solidify(|_| bottom, MIN_WALL_AREA);

        let tolerance = self.config.weld_tolerance;
        let mut watertight = mesh.is_watertight(tolerance);
        if !watertight && self.config.repair {
            let mut repaired = mesh.welded(tolerance);
            let filled = repaired.fill_holes();
            watertight = repaired.is_watertight(tolerance);
            log::warn!(
                "Terrain solid had open edges; filled {} holes, watertight: {}",
                filled,
                watertight
            );
            mesh = repaired;
        } else if !watertight {
            log::warn!("Terrain solid is not watertight");
        }

        log::debug!(
            "Terrain solid: {} vertices, {} faces, bottom {:.2}",
            mesh.vertices.len(),
            mesh.faces.len(),
            bottom
        );
        TerrainMesh {
            mesh,
            bottom,
            watertight,
        }
    }
}
