//! OpenStreetMap input in the session's local frame.

pub mod parser;

use crate::api::OverpassResponse;
use crate::domain::{FootprintPolygon, FootprintSource, RawRoad, RoadGraphSource, WaterSource};
use crate::geometry::CoordinateAnchor;

pub use parser::{parse_buildings, parse_roads, parse_water};

/// Parsed OSM data for a session area
#[derive(Debug, Clone, Default)]
pub struct OsmExtract {
    pub roads: Vec<RawRoad>,
    pub water: Vec<FootprintPolygon>,
    pub buildings: Vec<FootprintPolygon>,
}

impl OsmExtract {
    pub fn from_response(response: &OverpassResponse, anchor: &CoordinateAnchor) -> Self {
        let extract = Self {
            roads: parse_roads(response, anchor),
            water: parse_water(response, anchor),
            buildings: parse_buildings(response, anchor),
        };
        log::info!(
            "OSM: {} roads, {} water areas, {} buildings",
            extract.roads.len(),
            extract.water.len(),
            extract.buildings.len()
        );
        extract
    }
}

impl RoadGraphSource for OsmExtract {
    fn edges(&self) -> Vec<RawRoad> {
        self.roads.clone()
    }
}

impl WaterSource for OsmExtract {
    fn polygons(&self) -> Vec<FootprintPolygon> {
        self.water.clone()
    }
}

impl FootprintSource for OsmExtract {
    fn buildings(&self) -> Vec<FootprintPolygon> {
        self.buildings.clone()
    }
}
