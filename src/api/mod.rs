pub mod opentopodata;
pub mod overpass;

pub use opentopodata::OpenTopoDataSampler;
pub use overpass::{OverpassResponse, fetch_features, geographic_bbox};
