use std::collections::HashMap;

/// Road classification based on OSM highway tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadClass {
    Motorway,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    Service,
    Path,
}

impl RoadClass {
    /// Classify a highway tag value into a RoadClass
    pub fn from_highway_tag(tag: &str) -> Option<RoadClass> {
        match tag {
            "motorway" | "motorway_link" => Some(RoadClass::Motorway),
            "trunk" | "trunk_link" | "primary" | "primary_link" => Some(RoadClass::Primary),
            "secondary" | "secondary_link" => Some(RoadClass::Secondary),
            "tertiary" | "tertiary_link" => Some(RoadClass::Tertiary),
            "residential" | "living_street" | "unclassified" | "road" => {
                Some(RoadClass::Residential)
            }
            "service" | "track" => Some(RoadClass::Service),
            "footway" | "cycleway" | "path" | "pedestrian" | "steps" | "bridleway" => {
                Some(RoadClass::Path)
            }
            _ => None, // Skip unknown road types
        }
    }
}

/// A road way as delivered by a road graph source: local-frame polyline plus
/// the untouched tag dictionary. Only the classifier reads the tags.
#[derive(Debug, Clone)]
pub struct RawRoad {
    pub id: u64,
    /// Points as (x, y) in the session's local frame (meters)
    pub points: Vec<(f64, f64)>,
    pub tags: HashMap<String, String>,
}

impl RawRoad {
    pub fn new(id: u64, points: Vec<(f64, f64)>, tags: HashMap<String, String>) -> Self {
        Self { id, points, tags }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Which signal made the classifier treat a segment as a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeSignal {
    /// `bridge=*` or `man_made=bridge`
    Tagged,
    /// `layer>=1`
    Layer,
    /// Geometric overlap with a water polygon
    WaterOverlap,
}

/// Structural type, used to pick the deck clearance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStructure {
    Beam,
    Arch,
    Suspension,
    CableStayed,
    Viaduct,
    Movable,
}

impl BridgeStructure {
    /// Interpret `bridge:structure` first, then the `bridge` value itself
    pub fn from_tags(bridge: Option<&str>, structure: Option<&str>) -> Self {
        let parse = |v: &str| match v {
            "arch" | "tied-arch" => Some(BridgeStructure::Arch),
            "suspension" | "simple-suspension" => Some(BridgeStructure::Suspension),
            "cable-stayed" => Some(BridgeStructure::CableStayed),
            "viaduct" | "aqueduct" => Some(BridgeStructure::Viaduct),
            "movable" | "drawbridge" | "bascule" | "swing" => Some(BridgeStructure::Movable),
            "beam" | "girder" | "truss" => Some(BridgeStructure::Beam),
            _ => None,
        };
        structure
            .and_then(parse)
            .or_else(|| bridge.and_then(parse))
            .unwrap_or(BridgeStructure::Beam)
    }

    /// Long-span structures that sit visibly higher above the water
    pub fn is_long_span(&self) -> bool {
        matches!(
            self,
            BridgeStructure::Arch | BridgeStructure::Suspension | BridgeStructure::CableStayed
        )
    }
}

/// Bridge attributes resolved once by the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgeInfo {
    pub signal: BridgeSignal,
    pub structure: BridgeStructure,
    /// OSM layer, clamped to >= 0
    pub layer: i8,
    /// Meters of the centerline inside water; zero unless it reached the
    /// crossing threshold
    pub water_overlap: f64,
}

impl BridgeInfo {
    pub fn over_water(&self) -> bool {
        self.water_overlap > 0.0
    }
}

/// Result of classification. Downstream code branches on this, never on tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoadKind {
    Ground,
    /// Bridge crossing water; its mask cuts the ground road set
    LowBridge(BridgeInfo),
    /// Overpass not crossing water; ground roads below stay intact
    HighBridge(BridgeInfo),
}

impl RoadKind {
    pub fn is_bridge(&self) -> bool {
        !matches!(self, RoadKind::Ground)
    }

    pub fn bridge(&self) -> Option<&BridgeInfo> {
        match self {
            RoadKind::Ground => None,
            RoadKind::LowBridge(info) | RoadKind::HighBridge(info) => Some(info),
        }
    }
}

/// A classified road segment. Immutable after classification.
#[derive(Debug, Clone)]
pub struct RoadSegment {
    pub id: u64,
    /// Points as (x, y) in the local frame (meters)
    pub points: Vec<(f64, f64)>,
    pub class: RoadClass,
    /// Physical width in meters after class lookup, scale and clamps
    pub width: f64,
    pub kind: RoadKind,
}
