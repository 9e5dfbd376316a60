//! Print-readiness checks on output triangles
//!
//! - NaN/Inf coordinates
//! - zero-area triangles
//! - normals that no longer match the winding

use super::builder::calculate_normal;
use super::{TaggedMesh, Triangle};

/// Minimum area for non-degenerate output triangles (square model units)
const MIN_TRIANGLE_AREA: f32 = 1e-10;

/// Counts of problems found in one mesh
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationReport {
    pub total: usize,
    pub degenerate: usize,
    pub invalid_coords: usize,
    pub invalid_normal: usize,
}

impl ValidationReport {
    pub fn has_issues(&self) -> bool {
        self.degenerate > 0 || self.invalid_coords > 0 || self.invalid_normal > 0
    }

    pub fn summary(&self) -> String {
        if !self.has_issues() {
            format!("{} triangles, no issues", self.total)
        } else {
            format!(
                "{} triangles: {} degenerate, {} invalid coords, {} bad normals",
                self.total, self.degenerate, self.invalid_coords, self.invalid_normal
            )
        }
    }
}

pub fn validate_triangles(triangles: &[Triangle]) -> ValidationReport {
    let mut report = ValidationReport {
        total: triangles.len(),
        ..Default::default()
    };
    for tri in triangles {
        if has_invalid_coords(tri) {
            report.invalid_coords += 1;
            continue;
        }
        if is_degenerate(tri) {
            report.degenerate += 1;
        }
        if !is_normal_valid(&tri.normal) {
            report.invalid_normal += 1;
        }
    }
    report
}

fn has_invalid_coords(tri: &Triangle) -> bool {
    tri.vertices.iter().flatten().any(|c| !c.is_finite())
        || tri.normal.iter().any(|c| !c.is_finite())
}

fn is_degenerate(tri: &Triangle) -> bool {
    triangle_area(&tri.vertices) < MIN_TRIANGLE_AREA
}

fn triangle_area(vertices: &[[f32; 3]; 3]) -> f32 {
    let [v0, v1, v2] = *vertices;
    let a = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let b = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
    let cx = a[1] * b[2] - a[2] * b[1];
    let cy = a[2] * b[0] - a[0] * b[2];
    let cz = a[0] * b[1] - a[1] * b[0];
    0.5 * (cx * cx + cy * cy + cz * cz).sqrt()
}

fn is_normal_valid(normal: &[f32; 3]) -> bool {
    let len_sq = normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2];
    len_sq.is_finite() && (0.99..=1.01).contains(&len_sq)
}

/// Recompute normals, drop invalid and degenerate triangles, and log what was
/// found. The mesh keeps its role.
pub fn clean_mesh(mesh: TaggedMesh) -> (TaggedMesh, ValidationReport) {
    let report = validate_triangles(&mesh.triangles);
    if report.has_issues() {
        log::warn!("{:?} mesh: {}", mesh.role, report.summary());
    } else {
        log::debug!("{:?} mesh: {}", mesh.role, report.summary());
    }
    let triangles = mesh
        .triangles
        .into_iter()
        .filter(|tri| !has_invalid_coords(tri) && !is_degenerate(tri))
        .map(|mut tri| {
            let [v0, v1, v2] = tri.vertices;
            tri.normal = calculate_normal(v0, v1, v2);
            tri
        })
        .collect();
    (TaggedMesh::new(mesh.role, triangles), report)
}
