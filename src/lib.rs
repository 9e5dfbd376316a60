//! zonemesh - Seamlessly tiled, watertight terrain and road meshes from
//! OpenStreetMap and elevation data

pub mod api;
pub mod config;
pub mod domain;
pub mod elevation;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod osm;
pub mod roads;
pub mod session;
pub mod terrain;
