use crate::domain::{FootprintKind, FootprintPolygon, RoadKind, RoadSegment};
use crate::geometry::polygon::{buffer_polyline, polygon_rings, split_polyline};

/// Flattening footprints for the ground roads.
///
/// Each centerline is cut into pieces of at most `chunk_length` meters and
/// every piece is buffered on its own, so a long road on a slope is levelled
/// in steps that still follow the terrain. Bridges leave the ground alone.
pub fn road_footprints(
    segments: &[RoadSegment],
    chunk_length: f64,
    arc_segments: usize,
) -> Vec<FootprintPolygon> {
    let mut out = Vec::new();
    for segment in segments.iter().filter(|s| s.kind == RoadKind::Ground) {
        for piece in split_polyline(&segment.points, chunk_length) {
            let buffered = buffer_polyline(&piece, segment.width / 2.0, arc_segments);
            for polygon in &buffered.0 {
                let (outer, holes) = polygon_rings(polygon);
                if outer.len() >= 3 {
                    out.push(FootprintPolygon::with_holes(FootprintKind::Road, outer, holes));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BridgeInfo, BridgeSignal, BridgeStructure, RoadClass};

    fn segment(kind: RoadKind, length: f64) -> RoadSegment {
        RoadSegment {
            id: 7,
            points: vec![(0.0, 0.0), (length, 0.0)],
            class: RoadClass::Residential,
            width: 6.0,
            kind,
        }
    }

    #[test]
    fn test_chunks_long_roads() {
        let footprints = road_footprints(&[segment(RoadKind::Ground, 100.0)], 40.0, 8);
        assert_eq!(footprints.len(), 3);
        assert!(footprints.iter().all(|f| f.kind == FootprintKind::Road));
        assert!(footprints.iter().all(|f| f.to_geo().is_ok()));
    }

    #[test]
    fn test_bridges_do_not_flatten() {
        let info = BridgeInfo {
            signal: BridgeSignal::Tagged,
            structure: BridgeStructure::Beam,
            layer: 1,
            water_overlap: 0.0,
        };
        let footprints = road_footprints(&[segment(RoadKind::HighBridge(info), 100.0)], 40.0, 8);
        assert!(footprints.is_empty());
    }
}
