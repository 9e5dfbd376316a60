//! Multi-zone sessions.
//!
//! A [`SessionContext`] holds the one coordinate anchor and the one elevation
//! reference of a session. It is built once, before any zone runs, and every
//! zone borrows it. Zones never talk to each other; each one owns its grid and
//! meshes and ends in a [`ZoneStatus`]. The only value zones share after
//! sampling is the floor height their solids are closed at.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::domain::{
    FootprintPolygon, FootprintSource, RawRoad, RoadGraphSource, RoadSegment, WaterSource,
};
use crate::elevation::{ElevationSampler, SyntheticTerrain};
use crate::error::TerrainError;
use crate::geometry::simplify::epsilon_for_spacing;
use crate::geometry::{Bounds, CoordinateAnchor};
use crate::roads::{BridgeClassifier, RoadMeshes, RoadNetworkMesher, road_footprints};
use crate::terrain::{
    ElevationReference, GridSpec, HeightfieldBuilder, SolidMeshBuilder, TerrainFootprints,
    TerrainMesh, TerrainSurface,
};

/// Cooperative cancellation shared between the caller and running zones
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), TerrainError> {
        if self.is_cancelled() {
            Err(TerrainError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Immutable state shared by every zone of a session
#[derive(Debug)]
pub struct SessionContext {
    anchor: CoordinateAnchor,
    reference: Option<ElevationReference>,
    config: PipelineConfig,
    fallback: SyntheticTerrain,
}

impl SessionContext {
    pub fn new(anchor: CoordinateAnchor, config: PipelineConfig) -> Self {
        Self {
            anchor,
            reference: None,
            config,
            fallback: SyntheticTerrain::default(),
        }
    }

    pub fn with_reference(mut self, reference: ElevationReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_fallback(mut self, fallback: SyntheticTerrain) -> Self {
        self.fallback = fallback;
        self
    }

    /// Survey `bounds` once and use the result as the session reference.
    /// Without a reference every zone normalizes to its own minimum, which
    /// breaks seams, so a failed survey is logged loudly.
    pub fn surveyed<S: ElevationSampler + ?Sized>(self, sampler: &S, bounds: Bounds) -> Self {
        match ElevationReference::survey(sampler, &self.anchor, bounds) {
            Ok(reference) => self.with_reference(reference),
            Err(err) => {
                log::warn!("Elevation survey with '{}' failed: {}", sampler.name(), err);
                match ElevationReference::survey(&self.fallback, &self.anchor, bounds) {
                    Ok(reference) => self.with_reference(reference),
                    Err(err) => {
                        log::warn!("No session elevation reference, zones will not align: {}", err);
                        self
                    }
                }
            }
        }
    }

    pub fn anchor(&self) -> &CoordinateAnchor {
        &self.anchor
    }

    pub fn reference(&self) -> Option<ElevationReference> {
        self.reference
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fallback(&self) -> &SyntheticTerrain {
        &self.fallback
    }
}

/// One zone of a layout. Row 0 is the southern row, column 0 the western.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneRequest {
    pub row: usize,
    pub col: usize,
    pub bounds: Bounds,
}

/// Regular split of a session area into zones
#[derive(Debug, Clone, Copy)]
pub struct ZoneLayout {
    pub bounds: Bounds,
    pub rows: usize,
    pub cols: usize,
}

impl ZoneLayout {
    pub fn grid(bounds: Bounds, rows: usize, cols: usize) -> Result<Self, TerrainError> {
        if !bounds.is_valid() {
            return Err(TerrainError::InvalidBounds(format!("{:?}", bounds)));
        }
        if rows == 0 || cols == 0 {
            return Err(TerrainError::InvalidBounds(format!(
                "zone grid {}x{} is empty",
                rows, cols
            )));
        }
        Ok(Self { bounds, rows, cols })
    }

    fn x_edge(&self, k: usize) -> f64 {
        if k == self.cols {
            self.bounds.max_x
        } else {
            self.bounds.min_x + self.bounds.width() * k as f64 / self.cols as f64
        }
    }

    fn y_edge(&self, k: usize) -> f64 {
        if k == self.rows {
            self.bounds.max_y
        } else {
            self.bounds.min_y + self.bounds.height() * k as f64 / self.rows as f64
        }
    }

    /// Bounds of zone (row, col). Neighbours share their edge coordinates
    /// exactly.
    pub fn zone_bounds(&self, row: usize, col: usize) -> Bounds {
        Bounds::new(
            self.x_edge(col),
            self.y_edge(row),
            self.x_edge(col + 1),
            self.y_edge(row + 1),
        )
    }

    pub fn zones(&self) -> Vec<ZoneRequest> {
        let mut out = Vec::with_capacity(self.rows * self.cols);
        for row in 0..self.rows {
            for col in 0..self.cols {
                out.push(ZoneRequest {
                    row,
                    col,
                    bounds: self.zone_bounds(row, col),
                });
            }
        }
        out
    }

    /// Grid spacing a zone of this layout gets at `resolution`
    pub fn spacing(&self, resolution: usize) -> f64 {
        GridSpec::for_bounds(self.zone_bounds(0, 0), resolution)
            .map(|spec| spec.spacing())
            .unwrap_or(1.0)
    }
}

/// Session-wide vector input, classified once so every zone sees the same
/// segments
#[derive(Debug, Clone, Default)]
pub struct SessionInputs {
    pub segments: Vec<RoadSegment>,
    /// Flattening footprints of the ground roads
    pub roads: Vec<FootprintPolygon>,
    pub water: Vec<FootprintPolygon>,
    pub buildings: Vec<FootprintPolygon>,
}

impl SessionInputs {
    pub fn gather(
        ctx: &SessionContext,
        layout: &ZoneLayout,
        roads: &dyn RoadGraphSource,
        water: &dyn WaterSource,
        footprints: &dyn FootprintSource,
    ) -> Self {
        let water = water.polygons();
        let buildings = footprints.buildings();
        let segments = Self::classify(ctx, layout, &roads.edges(), &water);
        let config = ctx.config();
        let roads = road_footprints(
            &segments,
            config.terrain.flatten_chunk_length,
            config.roads.arc_segments,
        );
        log::info!(
            "Session input: {} road segments ({} footprints), {} water polygons, {} buildings",
            segments.len(),
            roads.len(),
            water.len(),
            buildings.len()
        );
        Self {
            segments,
            roads,
            water,
            buildings,
        }
    }

    pub fn classify(
        ctx: &SessionContext,
        layout: &ZoneLayout,
        roads: &[RawRoad],
        water: &[FootprintPolygon],
    ) -> Vec<RoadSegment> {
        let config = ctx.config();
        let epsilon = epsilon_for_spacing(layout.spacing(config.terrain.resolution));
        BridgeClassifier::new(&config.bridges, &config.roads, water)
            .with_simplify(epsilon)
            .classify_all(roads)
    }
}

/// Everything one zone produced
#[derive(Debug, Clone)]
pub struct ZoneMeshes {
    pub request: ZoneRequest,
    pub surface: TerrainSurface,
    pub terrain: TerrainMesh,
    pub roads: RoadMeshes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneStatus {
    Completed,
    Failed(String),
    Cancelled,
}

/// Terminal state of one zone
#[derive(Debug, Clone)]
pub struct ZoneReport {
    pub row: usize,
    pub col: usize,
    pub status: ZoneStatus,
    pub meshes: Option<ZoneMeshes>,
}

fn overlapping(polygons: &[FootprintPolygon], window: &Bounds) -> Vec<FootprintPolygon> {
    polygons
        .iter()
        .filter(|p| p.bounds().is_some_and(|b| b.intersects(window)))
        .cloned()
        .collect()
}

/// Terrain and roads of one zone, before its solid is closed
struct ZoneDraft {
    request: ZoneRequest,
    surface: TerrainSurface,
    roads: RoadMeshes,
}

fn draft_zone<S: ElevationSampler + ?Sized>(
    ctx: &SessionContext,
    sampler: &S,
    inputs: &SessionInputs,
    request: ZoneRequest,
    cancel: &CancelToken,
) -> Result<ZoneDraft, TerrainError> {
    cancel.check()?;
    let config = ctx.config();
    let spacing = GridSpec::for_bounds(request.bounds, config.terrain.resolution)?.spacing();
    let window = request.bounds.inflate(spacing);

    let buildings = overlapping(&inputs.buildings, &window);
    let water = overlapping(&inputs.water, &window);
    let roads = overlapping(&inputs.roads, &window);

    let surface = HeightfieldBuilder::new(
        ctx.anchor(),
        ctx.reference(),
        &config.terrain,
        sampler,
        ctx.fallback(),
    )
    .build(
        request.bounds,
        TerrainFootprints {
            buildings: &buildings,
            roads: &roads,
            water: &water,
        },
        cancel,
    )?;
    if surface.degraded {
        log::warn!(
            "Zone ({}, {}) uses fallback terrain",
            request.row,
            request.col
        );
    }
    cancel.check()?;

    let roads = RoadNetworkMesher::new(&config.roads, &config.bridges, &surface, request.bounds)
        .mesh(&inputs.segments);

    Ok(ZoneDraft {
        request,
        surface,
        roads,
    })
}

fn finish_zone(
    ctx: &SessionContext,
    draft: ZoneDraft,
    floor: Option<f64>,
    cancel: &CancelToken,
) -> Result<ZoneMeshes, TerrainError> {
    cancel.check()?;
    let terrain = SolidMeshBuilder::new(&ctx.config().solid)
        .with_floor(floor)
        .build(draft.surface.carved.field());
    Ok(ZoneMeshes {
        request: draft.request,
        surface: draft.surface,
        terrain,
        roads: draft.roads,
    })
}

/// Run the full pipeline for one zone. The solid is closed at this zone's own
/// lowest point.
pub fn generate_zone<S: ElevationSampler + ?Sized>(
    ctx: &SessionContext,
    sampler: &S,
    inputs: &SessionInputs,
    request: ZoneRequest,
    cancel: &CancelToken,
) -> Result<ZoneMeshes, TerrainError> {
    let draft = draft_zone(ctx, sampler, inputs, request, cancel)?;
    finish_zone(ctx, draft, None, cancel)
}

/// Generate every zone of `layout` in parallel. One zone failing or being
/// cancelled does not affect the others. `on_done` is called from worker
/// threads as each zone finishes.
///
/// Surfaces are built first; every solid is then closed at the lowest surface
/// of the whole session so all tiles share one bottom plane.
pub fn generate_zones<S, F>(
    ctx: &SessionContext,
    sampler: &S,
    inputs: &SessionInputs,
    layout: &ZoneLayout,
    cancel: &CancelToken,
    on_done: F,
) -> Vec<ZoneReport>
where
    S: ElevationSampler + ?Sized,
    F: Fn(&ZoneReport) + Sync,
{
    let drafts: Vec<(ZoneRequest, Result<ZoneDraft, TerrainError>)> = layout
        .zones()
        .into_par_iter()
        .map(|request| (request, draft_zone(ctx, sampler, inputs, request, cancel)))
        .collect();

    let floor = drafts
        .iter()
        .filter_map(|(_, draft)| draft.as_ref().ok())
        .map(|draft| draft.surface.carved.field().min())
        .reduce(f64::min);
    if let Some(floor) = floor {
        log::debug!("Session floor {:.2}", floor);
    }

    drafts
        .into_par_iter()
        .map(|(request, draft)| {
            let result = draft.and_then(|draft| finish_zone(ctx, draft, floor, cancel));
            let (status, meshes) = match result {
                Ok(meshes) => (ZoneStatus::Completed, Some(meshes)),
                Err(TerrainError::Cancelled) => (ZoneStatus::Cancelled, None),
                Err(err) => {
                    log::error!("Zone ({}, {}) failed: {}", request.row, request.col, err);
                    (ZoneStatus::Failed(err.to_string()), None)
                }
            };
            let report = ZoneReport {
                row: request.row,
                col: request.col,
                status,
                meshes,
            };
            on_done(&report);
            report
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FootprintKind, RoadKind};
    use crate::elevation::{ElevationRaster, SampleGrid};
    use crate::error::ElevationError;
    use crate::osm::OsmExtract;
    use std::collections::HashMap;
    use std::f64::consts::SQRT_2;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Point at distance `t` along the band and `d` across it
    fn band_point(t: f64, d: f64) -> (f64, f64) {
        ((t + d) / SQRT_2, (t - d) / SQRT_2)
    }

    /// Signed distance from the band center line
    fn band_offset(x: f64, y: f64) -> f64 {
        (x - y) / SQRT_2
    }

    fn river_crossing() -> OsmExtract {
        OsmExtract {
            roads: vec![
                RawRoad::new(
                    1,
                    vec![(-120.0, 120.0), (120.0, -120.0)],
                    tags(&[("highway", "primary"), ("bridge", "yes")]),
                ),
                RawRoad::new(
                    2,
                    vec![(-400.0, 400.0), (-120.0, 120.0)],
                    tags(&[("highway", "primary")]),
                ),
                RawRoad::new(
                    3,
                    vec![(120.0, -120.0), (400.0, -400.0)],
                    tags(&[("highway", "primary")]),
                ),
            ],
            water: vec![FootprintPolygon::water(vec![
                band_point(-800.0, -100.0),
                band_point(800.0, -100.0),
                band_point(800.0, 100.0),
                band_point(-800.0, 100.0),
            ])],
            buildings: Vec::new(),
        }
    }

    fn config(resolution: usize) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.terrain.resolution = resolution;
        config
    }

    #[test]
    fn test_layout_shares_edges() {
        let layout = ZoneLayout::grid(Bounds::new(-500.0, -300.0, 500.0, 300.0), 3, 3).unwrap();
        let zones = layout.zones();
        assert_eq!(zones.len(), 9);
        assert_eq!(
            layout.zone_bounds(0, 0).max_x,
            layout.zone_bounds(0, 1).min_x
        );
        assert_eq!(
            layout.zone_bounds(1, 2).max_y,
            layout.zone_bounds(2, 2).min_y
        );
        assert_eq!(layout.zone_bounds(2, 2).max_x, 500.0);
        assert_eq!(layout.zone_bounds(2, 2).max_y, 300.0);
        assert!(ZoneLayout::grid(layout.bounds, 0, 2).is_err());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(token.check().is_ok());
        shared.cancel();
        assert!(matches!(token.check(), Err(TerrainError::Cancelled)));
    }

    #[test]
    fn test_bridge_over_water_end_to_end() {
        let ctx = SessionContext::new(CoordinateAnchor::new(47.37, 8.54), config(100));
        let layout = ZoneLayout::grid(Bounds::new(-500.0, -500.0, 500.0, 500.0), 1, 1).unwrap();
        let source = river_crossing();
        let inputs = SessionInputs::gather(&ctx, &layout, &source, &source, &source);
        let sampler = SyntheticTerrain::flat(50.0);

        let zone = generate_zone(
            &ctx,
            &sampler,
            &inputs,
            layout.zones()[0],
            &CancelToken::new(),
        )
        .unwrap();

        assert!(!zone.surface.degraded);
        assert!(zone.terrain.watertight);
        assert_eq!(zone.roads.spans.len(), 1);
        assert!(zone.roads.spans[0].over_water);

        let water_level = zone.surface.water[0].surface;
        let min_clearance = ctx.config().bridges.min_water_clearance;
        let deck_min = zone.roads.bridges.min_z().unwrap() as f64;
        assert!(deck_min >= water_level + min_clearance - 1e-4);

        assert!(!zone.roads.ground.is_empty());
        for tri in &zone.roads.ground.triangles {
            for v in &tri.vertices {
                let d = band_offset(v[0] as f64, v[1] as f64);
                assert!(d.abs() >= 100.0 - 1e-3, "ground vertex in water at {:?}", v);
            }
        }
    }

    #[test]
    fn test_gather_cuts_road_footprints() {
        let ctx = SessionContext::new(CoordinateAnchor::new(47.37, 8.54), config(100));
        let layout = ZoneLayout::grid(Bounds::new(-500.0, -500.0, 500.0, 500.0), 1, 1).unwrap();
        let source = river_crossing();
        let inputs = SessionInputs::gather(&ctx, &layout, &source, &source, &source);
        let expected = road_footprints(
            &inputs.segments,
            ctx.config().terrain.flatten_chunk_length,
            ctx.config().roads.arc_segments,
        );
        assert!(!inputs.roads.is_empty());
        assert_eq!(inputs.roads.len(), expected.len());
        assert!(inputs.roads.iter().all(|f| f.kind == FootprintKind::Road));
    }

    #[test]
    fn test_approaches_stay_on_ground() {
        let ctx = SessionContext::new(CoordinateAnchor::new(47.37, 8.54), config(100));
        let layout = ZoneLayout::grid(Bounds::new(-500.0, -500.0, 500.0, 500.0), 1, 1).unwrap();
        let source = river_crossing();
        let inputs = SessionInputs::gather(&ctx, &layout, &source, &source, &source);
        let kinds: Vec<&RoadKind> = inputs.segments.iter().map(|s| &s.kind).collect();
        assert!(matches!(kinds[0], RoadKind::LowBridge(_)));
        assert_eq!(kinds[1], &RoadKind::Ground);
        assert_eq!(kinds[2], &RoadKind::Ground);
    }

    #[test]
    fn test_neighbouring_zones_agree_on_seam() {
        let bounds = Bounds::new(-500.0, -250.0, 500.0, 250.0);
        let sampler = SyntheticTerrain::default();
        let ctx = SessionContext::new(CoordinateAnchor::new(47.37, 8.54), config(60))
            .surveyed(&sampler, bounds);
        assert!(ctx.reference().is_some());
        let layout = ZoneLayout::grid(bounds, 1, 2).unwrap();

        let reports = generate_zones(
            &ctx,
            &sampler,
            &SessionInputs::default(),
            &layout,
            &CancelToken::new(),
            |_| {},
        );
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.status == ZoneStatus::Completed));

        let west = &reports[0].meshes.as_ref().unwrap().surface.carved;
        let east = &reports[1].meshes.as_ref().unwrap().surface.carved;
        for k in 0..=100 {
            let y = -250.0 + 5.0 * k as f64;
            let (a, b) = (west.height_at(0.0, y), east.height_at(0.0, y));
            assert!((a - b).abs() < 1e-3, "seam mismatch at y={}: {} vs {}", y, a, b);
        }
    }

    #[test]
    fn test_seam_agrees_under_crossing_road() {
        let bounds = Bounds::new(-500.0, -250.0, 500.0, 250.0);
        let sampler = SyntheticTerrain::default();
        let ctx = SessionContext::new(CoordinateAnchor::new(47.37, 8.54), config(60))
            .surveyed(&sampler, bounds);
        let layout = ZoneLayout::grid(bounds, 1, 2).unwrap();
        let source = OsmExtract {
            roads: vec![RawRoad::new(
                7,
                vec![(-300.0, 13.0), (300.0, 13.0)],
                tags(&[("highway", "primary")]),
            )],
            water: Vec::new(),
            buildings: Vec::new(),
        };
        let inputs = SessionInputs::gather(&ctx, &layout, &source, &source, &source);
        assert!(!inputs.roads.is_empty());

        let reports = generate_zones(
            &ctx,
            &sampler,
            &inputs,
            &layout,
            &CancelToken::new(),
            |_| {},
        );
        assert!(reports.iter().all(|r| r.status == ZoneStatus::Completed));
        let west = &reports[0].meshes.as_ref().unwrap().surface.carved;
        let east = &reports[1].meshes.as_ref().unwrap().surface.carved;
        for k in 0..=100 {
            let y = -250.0 + 5.0 * k as f64;
            let (a, b) = (west.height_at(0.0, y), east.height_at(0.0, y));
            assert!((a - b).abs() < 1e-3, "seam mismatch at y={}: {} vs {}", y, a, b);
        }
    }

    #[test]
    fn test_zones_share_bottom_plane() {
        let bounds = Bounds::new(-1500.0, -250.0, 1500.0, 250.0);
        let sampler = SyntheticTerrain::default();
        let ctx = SessionContext::new(CoordinateAnchor::new(47.37, 8.54), config(40))
            .surveyed(&sampler, bounds);
        let layout = ZoneLayout::grid(bounds, 1, 2).unwrap();

        let reports = generate_zones(
            &ctx,
            &sampler,
            &SessionInputs::default(),
            &layout,
            &CancelToken::new(),
            |_| {},
        );
        let zones: Vec<&ZoneMeshes> = reports.iter().filter_map(|r| r.meshes.as_ref()).collect();
        assert_eq!(zones.len(), 2);
        let lowest = zones
            .iter()
            .map(|z| z.surface.carved.field().min())
            .fold(f64::INFINITY, f64::min);
        let expected = lowest - ctx.config().solid.base_thickness;
        for zone in &zones {
            assert!((zone.terrain.bottom - expected).abs() < 1e-12);
            assert_eq!(zone.terrain.mesh.min_z(), Some(zone.terrain.bottom));
            assert!(zone.terrain.watertight);
        }
    }

    struct TransposingSampler;

    impl ElevationSampler for TransposingSampler {
        fn name(&self) -> &str {
            "transposing"
        }

        fn sample(&self, grid: &SampleGrid, _zoom: u8) -> Result<ElevationRaster, ElevationError> {
            Ok(ElevationRaster::new(grid.cols, grid.rows + 1, vec![0.0; grid.len()]))
        }
    }

    #[test]
    fn test_failed_and_cancelled_zones_report_status() {
        let ctx = SessionContext::new(CoordinateAnchor::new(47.37, 8.54), config(20));
        let layout = ZoneLayout::grid(Bounds::new(0.0, 0.0, 400.0, 200.0), 1, 2).unwrap();

        let reports = generate_zones(
            &ctx,
            &TransposingSampler,
            &SessionInputs::default(),
            &layout,
            &CancelToken::new(),
            |_| {},
        );
        assert!(
            reports
                .iter()
                .all(|r| matches!(r.status, ZoneStatus::Failed(_)) && r.meshes.is_none())
        );

        let cancel = CancelToken::new();
        cancel.cancel();
        let reports = generate_zones(
            &ctx,
            &SyntheticTerrain::default(),
            &SessionInputs::default(),
            &layout,
            &cancel,
            |_| {},
        );
        assert!(reports.iter().all(|r| r.status == ZoneStatus::Cancelled));
    }
}
