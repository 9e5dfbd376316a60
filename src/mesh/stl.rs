use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::Triangle;
use crate::geometry::Scaler;

/// Write triangles to a binary STL file, scaling local meters to millimeters
pub fn write_stl(path: &Path, triangles: &[Triangle], scaler: &Scaler) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create STL file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let stl_triangles = triangles.iter().map(|tri| {
        let scaled = tri.map_vertices(|v| scaler.scale_vertex(v));
        stl_io::Triangle {
            normal: stl_io::Vector::new(scaled.normal),
            vertices: scaled.vertices.map(stl_io::Vector::new),
        }
    });

    stl_io::write_stl(&mut writer, stl_triangles)
        .with_context(|| format!("Failed to write STL file: {}", path.display()))?;
    Ok(())
}

/// Size in bytes of a binary STL with the given number of triangles
pub fn estimate_stl_size(triangle_count: usize) -> usize {
    // 80 (header) + 4 (count) + triangles * (12 normal + 36 vertices + 2 attribute)
    80 + 4 + triangle_count * 50
}
