use super::{FootprintPolygon, RawRoad};

/// Delivers the road ways of a session area in the local frame
pub trait RoadGraphSource {
    fn edges(&self) -> Vec<RawRoad>;
}

/// Delivers water polygons in the local frame
pub trait WaterSource {
    fn polygons(&self) -> Vec<FootprintPolygon>;
}

/// Delivers building footprints in the local frame
pub trait FootprintSource {
    fn buildings(&self) -> Vec<FootprintPolygon>;
}
