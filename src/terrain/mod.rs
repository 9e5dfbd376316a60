//! Terrain heightfield of a zone: sampling, shaping, height queries and the
//! closed solid.

pub mod builder;
pub mod heightfield;
pub mod interpolate;
pub mod raster;
pub mod smoothing;
pub mod solid;

pub use builder::{
    ElevationReference, HeightfieldBuilder, TerrainFootprints, TerrainSurface, WaterBody,
};
pub use heightfield::{GridSpec, Heightfield};
pub use interpolate::SurfaceInterpolator;
pub use solid::{SolidMeshBuilder, TerrainMesh};
