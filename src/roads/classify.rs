use geo::Polygon;

use crate::config::{BridgeConfig, RoadConfig};
use crate::domain::{
    BridgeInfo, BridgeSignal, BridgeStructure, FootprintPolygon, RawRoad, RoadClass, RoadKind,
    RoadSegment,
};
use crate::geometry::polygon::length_inside;
use crate::geometry::simplify::simplify_polyline;

/// Resolves every raw road into a [`RoadSegment`] once. Nothing downstream
/// looks at tags again.
///
/// Bridge signals in priority order:
/// 1. `bridge=*` (anything but `no`) or `man_made=bridge`
/// 2. `layer >= 1`
/// 3. centerline runs at least `min_water_overlap` meters inside water
///
/// A bridge crossing water becomes [`RoadKind::LowBridge`], any other bridge
/// an overpass ([`RoadKind::HighBridge`]). Tunnels and `bridge=no` stay on
/// the ground.
pub struct BridgeClassifier<'a> {
    bridges: &'a BridgeConfig,
    roads: &'a RoadConfig,
    water: Vec<Polygon<f64>>,
    simplify_epsilon: Option<f64>,
}

impl<'a> BridgeClassifier<'a> {
    pub fn new(bridges: &'a BridgeConfig, roads: &'a RoadConfig, water: &[FootprintPolygon]) -> Self {
        let water = water
            .iter()
            .filter_map(|w| match w.to_geo() {
                Ok(p) => Some(p),
                Err(err) => {
                    log::debug!("Ignoring water polygon for bridge detection: {}", err);
                    None
                }
            })
            .collect();
        Self {
            bridges,
            roads,
            water,
            simplify_epsilon: None,
        }
    }

    /// Simplify centerlines with this tolerance (meters) before classifying
    pub fn with_simplify(mut self, epsilon: f64) -> Self {
        self.simplify_epsilon = Some(epsilon);
        self
    }

    pub fn classify_all(&self, roads: &[RawRoad]) -> Vec<RoadSegment> {
        let segments: Vec<RoadSegment> = roads.iter().filter_map(|r| self.classify(r)).collect();
        let low = segments
            .iter()
            .filter(|s| matches!(s.kind, RoadKind::LowBridge(_)))
            .count();
        let high = segments
            .iter()
            .filter(|s| matches!(s.kind, RoadKind::HighBridge(_)))
            .count();
        log::info!(
            "Classified {} roads: {} ground, {} water crossings, {} overpasses",
            segments.len(),
            segments.len() - low - high,
            low,
            high
        );
        segments
    }

    /// `None` for ways that are not drivable or walkable roads, or that have
    /// fewer than two points
    pub fn classify(&self, raw: &RawRoad) -> Option<RoadSegment> {
        let class = raw.tag("highway").and_then(RoadClass::from_highway_tag)?;
        let points = match self.simplify_epsilon {
            Some(eps) if self.roads.simplify => simplify_polyline(&raw.points, eps),
            _ => raw.points.clone(),
        };
        if points.len() < 2 {
            return None;
        }

        let kind = self.kind_of(raw, &points);
        let mut width = self.roads.width_for(class);
        if kind.is_bridge() {
            width = width.max(self.roads.width_for(self.bridges.min_width_class.into()));
        }

        Some(RoadSegment {
            id: raw.id,
            points,
            class,
            width,
            kind,
        })
    }

    /// Meters of `points` inside any water polygon
    pub fn water_overlap(&self, points: &[(f64, f64)]) -> f64 {
        self.water.iter().map(|w| length_inside(w, points)).sum()
    }

    fn kind_of(&self, raw: &RawRoad, points: &[(f64, f64)]) -> RoadKind {
        let bridge_tag = raw.tag("bridge");
        if bridge_tag == Some("no") || is_tunnel(raw) {
            return RoadKind::Ground;
        }

        let layer = raw
            .tag("layer")
            .and_then(|l| l.trim().parse::<i8>().ok())
            .unwrap_or(0)
            .max(0);
        let overlap = self.water_overlap(points);
        let crosses_water = overlap >= self.bridges.min_water_overlap;

        let signal = if bridge_tag.is_some() || raw.tag("man_made") == Some("bridge") {
            BridgeSignal::Tagged
        } else if layer >= 1 {
            BridgeSignal::Layer
        } else if crosses_water && self.bridges.infer_from_water {
            BridgeSignal::WaterOverlap
        } else {
            return RoadKind::Ground;
        };

        let info = BridgeInfo {
            signal,
            structure: BridgeStructure::from_tags(bridge_tag, raw.tag("bridge:structure")),
            layer,
            water_overlap: if crosses_water { overlap } else { 0.0 },
        };
        if crosses_water {
            RoadKind::LowBridge(info)
        } else {
            RoadKind::HighBridge(info)
        }
    }
}

fn is_tunnel(raw: &RawRoad) -> bool {
    matches!(raw.tag("tunnel"), Some(t) if t != "no")
        || raw.tag("covered") == Some("yes")
        || raw
            .tag("layer")
            .and_then(|l| l.trim().parse::<i8>().ok())
            .is_some_and(|l| l < 0)
}
