use geo::{BooleanOps, MultiPolygon, Polygon, Rect};

use super::pillars::pillars_for;
use super::span::{BridgeSpan, bridge_chains, chain_deck_height};
use crate::config::{BridgeConfig, RoadConfig};
use crate::domain::{RoadKind, RoadSegment};
use crate::error::GeometryError;
use crate::geometry::Bounds;
use crate::geometry::polygon::{buffer_polyline, densify_polygon, polygon_rings, union_all};
use crate::mesh::{IndexedMesh, MeshBuilder, MeshRole, TaggedMesh, extrude_flat, extrude_polygon};
use crate::terrain::TerrainSurface;

/// Road output of one zone
#[derive(Debug, Clone)]
pub struct RoadMeshes {
    pub ground: TaggedMesh,
    pub bridges: TaggedMesh,
    pub supports: TaggedMesh,
    pub spans: Vec<BridgeSpan>,
}

/// Buffers, splits and extrudes the classified road network of one zone.
///
/// Ground roads and water crossings are merged into one set first. Each
/// crossing cuts a mask (its buffer widened by `mask_margin`) out of that set;
/// what falls inside a mask becomes that crossing's deck. Overpasses are
/// meshed from their own buffers and leave the ground set alone.
pub struct RoadNetworkMesher<'a> {
    roads: &'a RoadConfig,
    bridges: &'a BridgeConfig,
    surface: &'a TerrainSurface,
    zone: Bounds,
}

impl<'a> RoadNetworkMesher<'a> {
    pub fn new(
        roads: &'a RoadConfig,
        bridges: &'a BridgeConfig,
        surface: &'a TerrainSurface,
        zone: Bounds,
    ) -> Self {
        Self {
            roads,
            bridges,
            surface,
            zone,
        }
    }

    pub fn mesh(&self, segments: &[RoadSegment]) -> RoadMeshes {
        let arc = self.roads.arc_segments;
        let reach = segments.iter().map(|s| s.width).fold(0.0, f64::max) + self.bridges.mask_margin;
        let window = self.zone.inflate(reach);
        let relevant: Vec<&RoadSegment> = segments
            .iter()
            .filter(|s| Bounds::from_points(&s.points).is_some_and(|b| b.intersects(&window)))
            .collect();

        let merged = union_all(
            relevant
                .iter()
                .filter(|s| !matches!(s.kind, RoadKind::HighBridge(_)))
                .map(|s| buffer_polyline(&s.points, s.width / 2.0, arc))
                .collect(),
        );

        // Chains come from the whole network so a bridge crossing the zone
        // edge gets the same deck in every zone.
        let all: Vec<&RoadSegment> = segments.iter().collect();
        let mut spans = Vec::new();
        let mut masks = Vec::new();
        for chain in bridge_chains(&all) {
            let touches_zone = chain
                .iter()
                .any(|s| Bounds::from_points(&s.points).is_some_and(|b| b.intersects(&window)));
            if !touches_zone {
                continue;
            }
            let Some(deck) = chain_deck_height(&chain, self.surface, self.bridges) else {
                continue;
            };
            let low = matches!(chain[0].kind, RoadKind::LowBridge(_));
            let pieces = chain
                .iter()
                .map(|segment| {
                    if low {
                        let mask = buffer_polyline(
                            &segment.points,
                            segment.width / 2.0 + self.bridges.mask_margin,
                            arc,
                        );
                        let piece = merged.intersection(&mask);
                        masks.push(mask);
                        piece
                    } else {
                        buffer_polyline(&segment.points, segment.width / 2.0, arc)
                    }
                })
                .collect();
            spans.push(BridgeSpan {
                segment_ids: chain.iter().map(|s| s.id).collect(),
                centerlines: chain.iter().map(|s| s.points.clone()).collect(),
                width: chain.iter().map(|s| s.width).fold(0.0, f64::max),
                deck,
                thickness: self.bridges.deck_thickness,
                over_water: chain
                    .iter()
                    .any(|s| s.kind.bridge().is_some_and(|info| info.over_water())),
                footprint: self.clip(&union_all(pieces)),
            });
        }

        let ground_set = self.clip(&merged.difference(&union_all(masks)));

        let mut ground = MeshBuilder::new(MeshRole::GroundRoads);
        for polygon in &ground_set.0 {
            match self.extrude_draped(polygon) {
                Ok(mesh) => ground.extend(mesh.to_triangles()),
                Err(err) => log::warn!("Skipping road polygon: {}", err),
            }
        }

        let mut decks = MeshBuilder::new(MeshRole::BridgeDecks);
        let mut supports = MeshBuilder::new(MeshRole::Supports);
        for span in &spans {
            for polygon in &span.footprint.0 {
                let (outer, holes) = polygon_rings(polygon);
                match extrude_flat(&outer, &holes, span.deck, span.top()) {
                    Ok(mesh) => decks.extend(mesh.to_triangles()),
                    Err(err) => log::warn!("Skipping deck of bridge {}: {}", span.id(), err),
                }
            }
            for pillar in pillars_for(span, self.surface, self.bridges, &self.zone) {
                supports.extend(pillar.to_triangles());
            }
        }

        log::debug!(
            "Roads: {} ground polygons, {} bridge spans, {} triangles",
            ground_set.0.len(),
            spans.len(),
            ground.len() + decks.len() + supports.len()
        );
        RoadMeshes {
            ground: ground.finish(),
            bridges: decks.finish(),
            supports: supports.finish(),
            spans,
        }
    }

    fn clip(&self, set: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        let b = &self.zone;
        let rect = Rect::new((b.min_x, b.min_y), (b.max_x, b.max_y)).to_polygon();
        set.intersection(&MultiPolygon::new(vec![rect]))
    }

    /// Height of the road base at (x, y). Where the ground was carved away
    /// under water the base stays just above the original surface.
    fn base_height(&self, x: f64, y: f64) -> f64 {
        let carved = self.surface.carved.height_at(x, y);
        let original = self.surface.original.height_at(x, y);
        if original - carved > self.roads.pontoon_threshold {
            original + self.roads.pontoon_lift
        } else {
            carved
        }
    }

    fn extrude_draped(&self, polygon: &Polygon<f64>) -> Result<IndexedMesh, GeometryError> {
        let spacing = self.surface.spacing();
        let (outer, holes) = polygon_rings(&densify_polygon(polygon, spacing));
        extrude_polygon(
            &outer,
            &holes,
            |x, y| self.base_height(x, y) + self.roads.thickness,
            |x, y| self.base_height(x, y) - self.roads.embed_depth,
            Some(spacing),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BridgeInfo, BridgeSignal, BridgeStructure, RoadClass};
    use crate::geometry::polygon::to_polygon;
    use crate::terrain::heightfield::{GridSpec, Heightfield};
    use crate::terrain::{SurfaceInterpolator, WaterBody};
    use geo::{Contains, Coord};

    const BOUNDS: Bounds = Bounds {
        min_x: -200.0,
        min_y: -200.0,
        max_x: 200.0,
        max_y: 200.0,
    };

    /// Flat ground at 2.0 with a river between y = -30 and y = 30 carved 2 deep
    fn river_surface() -> TerrainSurface {
        let spec = GridSpec::for_bounds(BOUNDS, 81).unwrap();
        let original = Heightfield::filled(spec, 2.0);
        let mut carved = original.clone();
        for j in 0..spec.rows {
            for i in 0..spec.cols {
                let (_, y) = spec.node_position(i, j);
                if y.abs() < 30.0 {
                    carved.set(i, j, 0.0);
                }
            }
        }
        TerrainSurface {
            carved: SurfaceInterpolator::new(carved),
            original: SurfaceInterpolator::new(original),
            water: vec![WaterBody {
                polygon: to_polygon(
                    &[(-300.0, -30.0), (300.0, -30.0), (300.0, 30.0), (-300.0, 30.0)],
                    &[],
                ),
                surface: 2.0,
            }],
            degraded: false,
        }
    }

    fn low_bridge() -> RoadKind {
        RoadKind::LowBridge(BridgeInfo {
            signal: BridgeSignal::Tagged,
            structure: BridgeStructure::Beam,
            layer: 0,
            water_overlap: 60.0,
        })
    }

    fn seg(id: u64, points: Vec<(f64, f64)>, kind: RoadKind) -> RoadSegment {
        RoadSegment {
            id,
            points,
            class: RoadClass::Primary,
            width: 10.0,
            kind,
        }
    }

    #[test]
    fn test_ground_road_is_draped() {
        let (r, b) = (RoadConfig::default(), BridgeConfig::default());
        let surface = river_surface();
        let mesher = RoadNetworkMesher::new(&r, &b, &surface, BOUNDS);
        let meshes = mesher.mesh(&[seg(1, vec![(-150.0, 100.0), (150.0, 100.0)], RoadKind::Ground)]);
        assert!(!meshes.ground.is_empty());
        assert!(meshes.bridges.is_empty());
        let min = meshes.ground.min_z().unwrap() as f64;
        assert!((min - (2.0 - r.embed_depth)).abs() < 1e-4);
        let max = meshes
            .ground
            .triangles
            .iter()
            .map(|t| t.max_z())
            .fold(f32::MIN, f32::max) as f64;
        assert!((max - (2.0 + r.thickness)).abs() < 1e-4);
    }

    #[test]
    fn test_low_bridge_splits_ground_set() {
        let (r, b) = (RoadConfig::default(), BridgeConfig::default());
        let surface = river_surface();
        let mesher = RoadNetworkMesher::new(&r, &b, &surface, BOUNDS);
        let meshes = mesher.mesh(&[
            seg(1, vec![(0.0, -150.0), (0.0, -50.0)], RoadKind::Ground),
            seg(2, vec![(0.0, -50.0), (0.0, 50.0)], low_bridge()),
            seg(3, vec![(0.0, 50.0), (0.0, 150.0)], RoadKind::Ground),
        ]);
        assert_eq!(meshes.spans.len(), 1);
        let span = &meshes.spans[0];
        assert!(span.over_water);
        assert!(span.deck >= 2.0 + b.min_water_clearance);
        assert!(meshes.bridges.min_z().unwrap() as f64 >= span.deck - 1e-4);

        let water = to_polygon(&[(-300.0, -30.0), (300.0, -30.0), (300.0, 30.0), (-300.0, 30.0)], &[]);
        for t in &meshes.ground.triangles {
            for v in &t.vertices {
                let c = Coord {
                    x: v[0] as f64,
                    y: v[1] as f64,
                };
                assert!(!water.contains(&c));
            }
        }
        assert!(!meshes.supports.is_empty());
    }

    #[test]
    fn test_pontoon_lift_over_carved_ground() {
        let (r, b) = (RoadConfig::default(), BridgeConfig::default());
        let surface = river_surface();
        let mesher = RoadNetworkMesher::new(&r, &b, &surface, BOUNDS);
        assert_eq!(mesher.base_height(0.0, 0.0), 2.0 + r.pontoon_lift);
        assert_eq!(mesher.base_height(0.0, 100.0), 2.0);
    }

    #[test]
    fn test_overpass_keeps_ground_below() {
        let (r, b) = (RoadConfig::default(), BridgeConfig::default());
        let surface = river_surface();
        let mesher = RoadNetworkMesher::new(&r, &b, &surface, BOUNDS);
        let over = RoadKind::HighBridge(BridgeInfo {
            signal: BridgeSignal::Layer,
            structure: BridgeStructure::Beam,
            layer: 1,
            water_overlap: 0.0,
        });
        let meshes = mesher.mesh(&[
            seg(1, vec![(-150.0, 100.0), (150.0, 100.0)], RoadKind::Ground),
            seg(2, vec![(0.0, 60.0), (0.0, 140.0)], over),
        ]);
        // the ground road is not cut: it still spans the full width
        let xs = meshes.ground.triangles.iter().flat_map(|t| t.vertices.iter().map(|v| v[0]));
        let (lo, hi) = xs.fold((f32::MAX, f32::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
        assert!(lo < -150.0 && hi > 150.0);
        assert_eq!(meshes.spans.len(), 1);
        assert!((meshes.spans[0].deck - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_output_clipped_to_zone() {
        let (r, b) = (RoadConfig::default(), BridgeConfig::default());
        let surface = river_surface();
        let zone = Bounds::new(-200.0, 50.0, 0.0, 200.0);
        let mesher = RoadNetworkMesher::new(&r, &b, &surface, zone);
        let meshes = mesher.mesh(&[seg(1, vec![(-150.0, 100.0), (150.0, 100.0)], RoadKind::Ground)]);
        for t in &meshes.ground.triangles {
            for v in &t.vertices {
                assert!(v[0] <= 1e-3);
            }
        }
        assert_eq!(meshes.ground.role, MeshRole::GroundRoads);
    }

    #[test]
    fn test_bridge_split_across_ways_has_one_deck() {
        let (r, b) = (RoadConfig::default(), BridgeConfig::default());
        let surface = river_surface();
        let mesher = RoadNetworkMesher::new(&r, &b, &surface, BOUNDS);
        let meshes = mesher.mesh(&[
            seg(1, vec![(0.0, -150.0), (0.0, -50.0)], RoadKind::Ground),
            seg(2, vec![(0.0, -50.0), (0.0, 0.0)], low_bridge()),
            seg(3, vec![(0.0, 0.0), (0.0, 50.0)], low_bridge()),
            seg(4, vec![(0.0, 50.0), (0.0, 150.0)], RoadKind::Ground),
        ]);
        assert_eq!(meshes.spans.len(), 1);
        assert_eq!(meshes.spans[0].segment_ids, vec![2, 3]);
        let deck = meshes.spans[0].deck;
        for t in &meshes.bridges.triangles {
            for v in &t.vertices {
                let z = v[2] as f64;
                assert!((z - deck).abs() < 1e-4 || (z - (deck + b.deck_thickness)).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_chain_deck_same_in_every_zone() {
        let (r, b) = (RoadConfig::default(), BridgeConfig::default());
        let surface = river_surface();
        let arch = RoadKind::LowBridge(BridgeInfo {
            signal: BridgeSignal::Tagged,
            structure: BridgeStructure::Arch,
            layer: 0,
            water_overlap: 0.0,
        });
        let segments = [
            seg(1, vec![(0.0, -150.0), (0.0, -60.0)], arch),
            seg(2, vec![(0.0, -60.0), (0.0, 60.0)], low_bridge()),
            seg(3, vec![(0.0, 60.0), (0.0, 150.0)], low_bridge()),
        ];
        let south = Bounds::new(-200.0, -200.0, 200.0, -100.0);
        let north = Bounds::new(-200.0, 100.0, 200.0, 200.0);
        let a = RoadNetworkMesher::new(&r, &b, &surface, south).mesh(&segments);
        let n = RoadNetworkMesher::new(&r, &b, &surface, north).mesh(&segments);
        assert_eq!(a.spans.len(), 1);
        assert_eq!(n.spans.len(), 1);
        assert!((a.spans[0].deck - (2.0 + b.long_span_clearance)).abs() < 1e-9);
        assert_eq!(a.spans[0].deck, n.spans[0].deck);
    }
}
