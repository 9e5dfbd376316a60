use crate::api::OverpassResponse;
use crate::api::overpass::Element;
use crate::domain::{FootprintPolygon, RawRoad, RoadClass};
use crate::geometry::CoordinateAnchor;
use std::collections::HashMap;

/// node id → local (x, y)
type NodeLookup = HashMap<u64, (f64, f64)>;

fn build_node_lookup(response: &OverpassResponse, anchor: &CoordinateAnchor) -> NodeLookup {
    response
        .elements
        .iter()
        .filter(|e| e.type_ == "node")
        .filter_map(|e| {
            let lat = e.lat?;
            let lon = e.lon?;
            Some((e.id, anchor.from_geographic(lat, lon)))
        })
        .collect()
}

fn resolve_way_to_points(node_refs: &[u64], nodes: &NodeLookup) -> Vec<(f64, f64)> {
    node_refs
        .iter()
        .filter_map(|id| nodes.get(id).copied())
        .collect()
}

fn is_closed_way(points: &[(f64, f64)]) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 4 => {
            (first.0 - last.0).abs() < 1e-9 && (first.1 - last.1).abs() < 1e-9
        }
        _ => false,
    }
}

fn ways(response: &OverpassResponse) -> impl Iterator<Item = (&Element, &HashMap<String, String>)> {
    response
        .elements
        .iter()
        .filter(|e| e.type_ == "way")
        .filter_map(|e| e.tags.as_ref().map(|t| (e, t)))
}

fn is_water_area(tags: &HashMap<String, String>) -> bool {
    let tag = |k: &str| tags.get(k).map(String::as_str);
    tag("natural") == Some("water")
        || tag("waterway") == Some("riverbank")
        || matches!(tag("landuse"), Some("reservoir" | "basin"))
}

/// Road ways with their full tag dictionaries, in the local frame.
///
/// Ways whose `highway` value does not map to a road class are dropped, as
/// are ways with fewer than two resolvable nodes.
pub fn parse_roads(response: &OverpassResponse, anchor: &CoordinateAnchor) -> Vec<RawRoad> {
    let nodes = build_node_lookup(response, anchor);
    let mut roads = Vec::new();

    for (element, tags) in ways(response) {
        let Some(highway) = tags.get("highway") else {
            continue;
        };
        if RoadClass::from_highway_tag(highway).is_none() {
            continue;
        }
        let Some(node_refs) = &element.nodes else {
            continue;
        };
        let points = resolve_way_to_points(node_refs, &nodes);
        if points.len() < 2 {
            continue;
        }
        roads.push(RawRoad::new(element.id, points, tags.clone()));
    }

    log::debug!("Parsed {} road ways", roads.len());
    roads
}

/// Closed water ways as polygons. The closing point is dropped.
pub fn parse_water(response: &OverpassResponse, anchor: &CoordinateAnchor) -> Vec<FootprintPolygon> {
    parse_areas(response, anchor, is_water_area, FootprintPolygon::water)
}

/// Closed building ways as polygons
pub fn parse_buildings(
    response: &OverpassResponse,
    anchor: &CoordinateAnchor,
) -> Vec<FootprintPolygon> {
    parse_areas(
        response,
        anchor,
        |tags| tags.get("building").is_some_and(|b| b != "no"),
        FootprintPolygon::building,
    )
}

fn parse_areas(
    response: &OverpassResponse,
    anchor: &CoordinateAnchor,
    wanted: impl Fn(&HashMap<String, String>) -> bool,
    make: impl Fn(Vec<(f64, f64)>) -> FootprintPolygon,
) -> Vec<FootprintPolygon> {
    let nodes = build_node_lookup(response, anchor);
    let mut polygons = Vec::new();

    for (element, tags) in ways(response) {
        if !wanted(tags) {
            continue;
        }
        let Some(node_refs) = &element.nodes else {
            continue;
        };
        let mut points = resolve_way_to_points(node_refs, &nodes);
        if !is_closed_way(&points) {
            continue;
        }
        points.pop();
        polygons.push(make(points));
    }

    polygons
}
