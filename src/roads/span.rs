use geo::MultiPolygon;

use crate::config::BridgeConfig;
use crate::domain::{BridgeInfo, RoadKind, RoadSegment};
use crate::geometry::polygon::densify_polyline;
use crate::terrain::TerrainSurface;

/// Endpoints closer than this (meters) join two bridge ways into one span
const JOIN_TOLERANCE: f64 = 1e-6;

/// An elevated piece of road, ready to be meshed. A bridge mapped as several
/// ways joined end to end is one span with one deck.
#[derive(Debug, Clone)]
pub struct BridgeSpan {
    pub segment_ids: Vec<u64>,
    pub centerlines: Vec<Vec<(f64, f64)>>,
    /// Widest member
    pub width: f64,
    /// Height of the deck underside
    pub deck: f64,
    pub thickness: f64,
    pub over_water: bool,
    /// Area covered by the deck
    pub footprint: MultiPolygon<f64>,
}

impl BridgeSpan {
    pub fn top(&self) -> f64 {
        self.deck + self.thickness
    }

    /// First way id, for log messages
    pub fn id(&self) -> u64 {
        self.segment_ids.first().copied().unwrap_or_default()
    }
}

fn shares_endpoint(a: &RoadSegment, b: &RoadSegment) -> bool {
    let ends = |s: &RoadSegment| [s.points.first().copied(), s.points.last().copied()];
    ends(a).iter().flatten().any(|p| {
        ends(b)
            .iter()
            .flatten()
            .any(|q| (p.0 - q.0).hypot(p.1 - q.1) < JOIN_TOLERANCE)
    })
}

/// Group bridge segments into spans: segments of the same kind (both water
/// crossings or both overpasses) that share an endpoint end up in one group.
/// Ground segments are ignored. Groups keep input order.
pub fn bridge_chains<'s>(segments: &[&'s RoadSegment]) -> Vec<Vec<&'s RoadSegment>> {
    let bridges: Vec<&RoadSegment> = segments
        .iter()
        .copied()
        .filter(|s| s.kind.is_bridge())
        .collect();
    let low = |s: &RoadSegment| matches!(s.kind, RoadKind::LowBridge(_));

    let mut parent: Vec<usize> = (0..bridges.len()).collect();
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    for i in 0..bridges.len() {
        for j in i + 1..bridges.len() {
            if low(bridges[i]) == low(bridges[j]) && shares_endpoint(bridges[i], bridges[j]) {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                parent[b.max(a)] = a.min(b);
            }
        }
    }

    let mut groups: Vec<(usize, Vec<&RoadSegment>)> = Vec::new();
    for (i, segment) in bridges.iter().enumerate() {
        let r = root(&mut parent, i);
        match groups.iter_mut().find(|(g, _)| *g == r) {
            Some((_, members)) => members.push(segment),
            None => groups.push((r, vec![segment])),
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}

/// One deck height for a group of joined bridge segments: the highest deck any
/// member needs on its own
pub fn chain_deck_height(
    chain: &[&RoadSegment],
    surface: &TerrainSurface,
    config: &BridgeConfig,
) -> Option<f64> {
    chain
        .iter()
        .filter_map(|s| s.kind.bridge().map(|info| deck_height(s, info, surface, config)))
        .reduce(f64::max)
}

/// Clearance above the reference level for a bridge
pub fn clearance_for(info: &BridgeInfo, config: &BridgeConfig) -> f64 {
    if info.structure.is_long_span() {
        config.long_span_clearance
    } else if info.layer >= 1 {
        info.layer as f64 * config.layer_increment
    } else {
        config.default_clearance
    }
}

/// Deck underside height for a bridge segment.
///
/// The reference level is the original water surface for water crossings and
/// the highest pre-carve ground along the centerline otherwise. Carved riverbeds
/// are never used. Over water the deck keeps at least `min_water_clearance`
/// above the water, and it never dips below the ground along its centerline.
pub fn deck_height(
    segment: &RoadSegment,
    info: &BridgeInfo,
    surface: &TerrainSurface,
    config: &BridgeConfig,
) -> f64 {
    let samples = densify_polyline(&segment.points, surface.spacing());
    let ground = surface.original.max_along(&samples).unwrap_or(0.0);
    let water = samples
        .iter()
        .filter_map(|&(x, y)| surface.water_surface_at(x, y))
        .reduce(f64::max);

    let clearance = clearance_for(info, config);
    let mut deck = match (info.over_water(), water) {
        (true, Some(w)) => (w + clearance).max(w + config.min_water_clearance),
        _ => ground + clearance,
    };
    deck = deck.max(ground);
    log::debug!(
        "Bridge {}: deck {:.2} (ground {:.2}, water {:?}, clearance {:.1})",
        segment.id,
        deck,
        ground,
        water,
        clearance
    );
    deck
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BridgeSignal, BridgeStructure, RoadClass, RoadKind};
    use crate::geometry::Bounds;
    use crate::geometry::polygon::to_polygon;
    use crate::terrain::heightfield::{GridSpec, Heightfield};
    use crate::terrain::{SurfaceInterpolator, WaterBody};

    fn surface(ground: f64, water: Option<f64>) -> TerrainSurface {
        let spec = GridSpec::for_bounds(Bounds::new(-100.0, -100.0, 100.0, 100.0), 21).unwrap();
        let field = Heightfield::filled(spec, ground);
        let water = water
            .map(|surface| WaterBody {
                polygon: to_polygon(
                    &[(-100.0, -20.0), (100.0, -20.0), (100.0, 20.0), (-100.0, 20.0)],
                    &[],
                ),
                surface,
            })
            .into_iter()
            .collect();
        TerrainSurface {
            carved: SurfaceInterpolator::new(field.clone()),
            original: SurfaceInterpolator::new(field),
            water,
            degraded: false,
        }
    }

    fn bridge(info: BridgeInfo) -> RoadSegment {
        RoadSegment {
            id: 3,
            points: vec![(0.0, -50.0), (0.0, 50.0)],
            class: RoadClass::Primary,
            width: 10.0,
            kind: RoadKind::LowBridge(info),
        }
    }

    fn way(id: u64, points: Vec<(f64, f64)>, kind: RoadKind) -> RoadSegment {
        RoadSegment {
            id,
            points,
            class: RoadClass::Primary,
            width: 10.0,
            kind,
        }
    }

    fn info(structure: BridgeStructure, layer: i8, overlap: f64) -> BridgeInfo {
        BridgeInfo {
            signal: BridgeSignal::Tagged,
            structure,
            layer,
            water_overlap: overlap,
        }
    }

    #[test]
    fn test_clearance_priority() {
        let config = BridgeConfig::default();
        assert_eq!(clearance_for(&info(BridgeStructure::Arch, 3, 0.0), &config), 12.0);
        assert_eq!(clearance_for(&info(BridgeStructure::Beam, 3, 0.0), &config), 15.0);
        assert_eq!(clearance_for(&info(BridgeStructure::Beam, 0, 0.0), &config), 4.0);
    }

    #[test]
    fn test_water_crossing_respects_min_clearance() {
        let config = BridgeConfig::default();
        let surface = surface(2.0, Some(2.0));
        let i = info(BridgeStructure::Beam, 0, 40.0);
        let deck = deck_height(&bridge(i), &i, &surface, &config);
        assert!(deck >= 2.0 + config.min_water_clearance);
    }

    #[test]
    fn test_overpass_measured_from_ground() {
        let config = BridgeConfig::default();
        let surface = surface(7.0, None);
        let i = info(BridgeStructure::Beam, 1, 0.0);
        let deck = deck_height(&bridge(i), &i, &surface, &config);
        assert!((deck - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_joined_ways_form_one_chain() {
        let low = RoadKind::LowBridge(info(BridgeStructure::Beam, 0, 40.0));
        let high = RoadKind::HighBridge(info(BridgeStructure::Beam, 1, 0.0));
        let a = way(1, vec![(0.0, -50.0), (0.0, 0.0)], low);
        let b = way(2, vec![(0.0, 50.0), (0.0, 0.0)], low);
        let c = way(3, vec![(0.0, 50.0), (0.0, 90.0)], high);
        let d = way(4, vec![(80.0, 0.0), (90.0, 0.0)], low);
        let e = way(5, vec![(0.0, -90.0), (0.0, -50.0)], RoadKind::Ground);
        let chains = bridge_chains(&[&a, &b, &c, &d, &e]);
        let ids: Vec<Vec<u64>> = chains
            .iter()
            .map(|chain| chain.iter().map(|s| s.id).collect())
            .collect();
        assert_eq!(ids, vec![vec![1, 2], vec![3], vec![4]]);
    }

    #[test]
    fn test_chain_shares_highest_deck() {
        let config = BridgeConfig::default();
        let surface = surface(2.0, Some(2.0));
        // the north half is tagged as an arch and wants more clearance
        let south = way(
            1,
            vec![(0.0, -50.0), (0.0, 0.0)],
            RoadKind::LowBridge(info(BridgeStructure::Beam, 0, 20.0)),
        );
        let north = way(
            2,
            vec![(0.0, 0.0), (0.0, 50.0)],
            RoadKind::LowBridge(info(BridgeStructure::Arch, 0, 20.0)),
        );
        let deck = chain_deck_height(&[&south, &north], &surface, &config).unwrap();
        assert!((deck - (2.0 + config.long_span_clearance)).abs() < 1e-9);
    }
}
