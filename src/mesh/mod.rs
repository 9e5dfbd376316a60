pub mod builder;
pub mod extrusion;
pub mod indexed;
pub mod stl;
pub mod triangulation;
pub mod validation;

pub use builder::{MeshBuilder, MeshRole, TaggedMesh, Triangle};
pub use extrusion::{extrude_flat, extrude_polygon};
pub use indexed::IndexedMesh;
pub use stl::write_stl;
pub use triangulation::{refine_to_edge_length, triangulate_polygon};
pub use validation::{ValidationReport, clean_mesh};
