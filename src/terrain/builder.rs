use geo::{Contains, Coord, Polygon};

use super::heightfield::{GridSpec, Heightfield};
use super::interpolate::SurfaceInterpolator;
use super::raster::{Representative, carve, flatten};
use super::smoothing::{gaussian_blur, kernel_radius};
use crate::config::TerrainConfig;
use crate::config::model::{DEGENERATE_RANGE, FLAT_RIPPLE};
use crate::domain::FootprintPolygon;
use crate::elevation::{ElevationSampler, SampleGrid, SyntheticTerrain, zoom_for_spacing};
use crate::error::{ElevationError, TerrainError};
use crate::geometry::{Bounds, CoordinateAnchor};
use crate::session::CancelToken;

/// Samples per axis of the coarse survey grid
const SURVEY_SAMPLES: usize = 16;

/// Elevation (meters above datum) that maps to relative height zero for every
/// zone of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationReference {
    pub meters: f64,
}

impl ElevationReference {
    pub fn new(meters: f64) -> Self {
        Self { meters }
    }

    /// Lowest elevation on a coarse grid over `bounds`
    pub fn survey<S: ElevationSampler + ?Sized>(
        sampler: &S,
        anchor: &CoordinateAnchor,
        bounds: Bounds,
    ) -> Result<Self, ElevationError> {
        let spec = GridSpec::for_bounds(bounds, SURVEY_SAMPLES)
            .map_err(|e| ElevationError::Unavailable(e.to_string()))?;
        let grid = geographic_grid(anchor, &spec);
        let zoom = zoom_for_spacing(spec.spacing(), anchor.reference().0);
        let raster = sampler.sample(&grid, zoom)?;
        let lowest = raster
            .values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f64::min)
            .ok_or_else(|| ElevationError::Response("survey returned no finite samples".into()))?;
        log::info!(
            "Elevation reference {:.1} m from {} survey samples",
            lowest,
            raster.values.len()
        );
        Ok(Self::new(lowest))
    }
}

/// Footprints that shape the heightfield of one zone
#[derive(Debug, Clone, Copy, Default)]
pub struct TerrainFootprints<'a> {
    pub buildings: &'a [FootprintPolygon],
    pub roads: &'a [FootprintPolygon],
    pub water: &'a [FootprintPolygon],
}

/// A carved water polygon with the bank height it was carved from
#[derive(Debug, Clone)]
pub struct WaterBody {
    pub polygon: Polygon<f64>,
    /// Lowest smoothed height under the polygon, before any flattening
    pub surface: f64,
}

/// Finished terrain of one zone
#[derive(Debug, Clone)]
pub struct TerrainSurface {
    /// Final heights, water carved
    pub carved: SurfaceInterpolator,
    /// Heights before carving, used to find water and bank levels
    pub original: SurfaceInterpolator,
    pub water: Vec<WaterBody>,
    /// A fallback sampler produced the heights
    pub degraded: bool,
}

impl TerrainSurface {
    /// Original water surface at (x, y) if the point lies in a carved water body
    pub fn water_surface_at(&self, x: f64, y: f64) -> Option<f64> {
        let c = Coord { x, y };
        self.water
            .iter()
            .filter(|w| w.polygon.contains(&c))
            .map(|w| w.surface)
            .reduce(f64::max)
    }

    pub fn spacing(&self) -> f64 {
        self.carved.field().spec().spacing()
    }

    pub fn bounds(&self) -> Bounds {
        self.carved.field().spec().bounds
    }
}

/// Row-major geographic query points for every node of `spec`
pub fn geographic_grid(anchor: &CoordinateAnchor, spec: &GridSpec) -> SampleGrid {
    SampleGrid {
        rows: spec.rows,
        cols: spec.cols,
        points: spec
            .node_positions()
            .into_iter()
            .map(|(x, y)| anchor.to_geographic(x, y))
            .collect(),
    }
}

/// Builds the heightfield of one zone.
///
/// 1. grid over the zone box, padded so footprints crossing the edge fit,
///    then padded again for smoothing
/// 2. absolute elevations from the sampler (synthetic fallback on failure)
/// 3. relative heights against the session reference
/// 4. Gaussian smoothing, then crop the smoothing margin
/// 5. flatten under buildings and roads
/// 6. carve water, keeping the pre-carve field
/// 7. crop to the zone and sanitize
///
/// Flatten levels and water surfaces are read from the smoothed field before
/// any footprint touched it. Together with the padding this makes every node
/// depend only on the terrain and the footprints covering it, so neighbouring
/// zones agree on their shared edge.
pub struct HeightfieldBuilder<'a, S: ?Sized> {
    anchor: &'a CoordinateAnchor,
    reference: Option<ElevationReference>,
    config: &'a TerrainConfig,
    sampler: &'a S,
    fallback: &'a SyntheticTerrain,
}

impl<'a, S: ElevationSampler + ?Sized> HeightfieldBuilder<'a, S> {
    pub fn new(
        anchor: &'a CoordinateAnchor,
        reference: Option<ElevationReference>,
        config: &'a TerrainConfig,
        sampler: &'a S,
        fallback: &'a SyntheticTerrain,
    ) -> Self {
        Self {
            anchor,
            reference,
            config,
            sampler,
            fallback,
        }
    }

    pub fn build(
        &self,
        bounds: Bounds,
        footprints: TerrainFootprints<'_>,
        cancel: &CancelToken,
    ) -> Result<TerrainSurface, TerrainError> {
        let spec = GridSpec::for_bounds(bounds, self.config.resolution)?;
        let sigma = self.config.effective_sigma();
        let blur_pad = kernel_radius(sigma);
        let seam_pad = self.seam_padding(&spec, footprints);
        let work = spec.padded(seam_pad);
        let sampled = work.padded(blur_pad);
        log::debug!(
            "Heightfield {}x{} (spacing {:.2} m, sigma {:.2}, pad {}+{})",
            spec.cols,
            spec.rows,
            spec.spacing(),
            sigma,
            seam_pad,
            blur_pad
        );

        let (absolute, degraded) = self.sample(&sampled)?;
        cancel.check()?;

        let mut field = Heightfield::new(sampled, self.to_relative(absolute));
        gaussian_blur(field.values_mut(), sampled.cols, sampled.rows, sigma);
        let mut field = field.crop(blur_pad);
        cancel.check()?;

        let smoothed = field.clone();
        let mut locked = vec![false; work.len()];
        self.flatten_footprints(&mut field, &smoothed, footprints, &mut locked);
        cancel.check()?;

        let original = field.clone();
        let water = self.carve_water(&mut field, &smoothed, footprints.water, &mut locked);

        let mut field = crop_to(&field, spec, seam_pad);
        let original = crop_to(&original, spec, seam_pad);
        let locked = crop_mask(&locked, &work, seam_pad);
        sanitize(&mut field, &locked);

        Ok(TerrainSurface {
            carved: SurfaceInterpolator::new(field),
            original: SurfaceInterpolator::new(original),
            water,
            degraded,
        })
    }

    /// Extra cells on each side so every footprint touching the zone lies
    /// inside the grid, up to `seam_padding` meters
    fn seam_padding(&self, spec: &GridSpec, footprints: TerrainFootprints<'_>) -> usize {
        let zone = spec.bounds;
        let window = zone.inflate(spec.spacing());
        let overshoot = [footprints.buildings, footprints.roads, footprints.water]
            .into_iter()
            .flatten()
            .filter_map(|f| f.bounds())
            .filter(|b| b.intersects(&window))
            .map(|b| {
                (zone.min_x - b.min_x)
                    .max(b.max_x - zone.max_x)
                    .max(zone.min_y - b.min_y)
                    .max(b.max_y - zone.max_y)
            })
            .fold(0.0, f64::max);
        if overshoot <= 0.0 {
            return 0;
        }
        let limit = self.config.seam_padding.max(0.0);
        if overshoot > limit {
            log::debug!(
                "Footprints reach {:.0} m past the zone, padding limited to {:.0} m",
                overshoot,
                limit
            );
        }
        (overshoot.min(limit) / spec.dx.min(spec.dy)).ceil() as usize + 1
    }

    /// Absolute elevations for every node. A shape mismatch is fatal; any
    /// other sampler failure falls back to synthetic terrain.
    fn sample(&self, spec: &GridSpec) -> Result<(Vec<f64>, bool), TerrainError> {
        let grid = geographic_grid(self.anchor, spec);
        let zoom = zoom_for_spacing(spec.spacing(), self.anchor.reference().0);

        let (raster, degraded) = match self.sampler.sample(&grid, zoom) {
            Ok(raster) => (raster, false),
            Err(err) => {
                log::warn!(
                    "Elevation source '{}' failed ({}); using synthetic terrain, quality degraded",
                    self.sampler.name(),
                    err
                );
                (self.fallback.sample(&grid, zoom)?, true)
            }
        };

        if !raster.matches(&grid) {
            return Err(TerrainError::ShapeMismatch {
                expected_rows: grid.rows,
                expected_cols: grid.cols,
                rows: raster.rows,
                cols: raster.cols,
                len: raster.values.len(),
            });
        }
        Ok((raster.values, degraded))
    }

    /// Relative model heights. Non-finite samples are filled before smoothing
    /// so they cannot spread.
    fn to_relative(&self, mut absolute: Vec<f64>) -> Vec<f64> {
        replace_non_finite(&mut absolute);
        let reference = match self.reference {
            Some(r) => r.meters,
            None => absolute.iter().copied().fold(f64::INFINITY, f64::min),
        };
        let reference = if reference.is_finite() { reference } else { 0.0 };
        absolute
            .into_iter()
            .map(|h| (h - reference) * self.config.vertical_scale + self.config.baseline_offset)
            .collect()
    }

    fn flatten_footprints(
        &self,
        field: &mut Heightfield,
        source: &Heightfield,
        footprints: TerrainFootprints<'_>,
        locked: &mut [bool],
    ) {
        let passes = [
            (
                self.config.flatten_buildings,
                footprints.buildings,
                Representative::Median,
            ),
            (
                self.config.flatten_roads,
                footprints.roads,
                Representative::Quantile(self.config.road_quantile),
            ),
        ];
        for (enabled, polygons, representative) in passes {
            if !enabled {
                continue;
            }
            let mut flattened = 0;
            for footprint in polygons {
                let result = footprint
                    .to_geo()
                    .and_then(|poly| flatten(field, source, &poly, representative, locked));
                match result {
                    Ok(_) => flattened += 1,
                    Err(err) => log::debug!("Skipping {:?} footprint: {}", footprint.kind, err),
                }
            }
            log::debug!("Flattened {} of {} footprints", flattened, polygons.len());
        }
    }

    fn carve_water(
        &self,
        field: &mut Heightfield,
        original: &Heightfield,
        polygons: &[FootprintPolygon],
        locked: &mut [bool],
    ) -> Vec<WaterBody> {
        let mut bodies = Vec::new();
        for footprint in polygons {
            let polygon = match footprint.to_geo() {
                Ok(p) => p,
                Err(err) => {
                    log::debug!("Skipping water polygon: {}", err);
                    continue;
                }
            };
            match carve(field, original, &polygon, self.config.water_depth, locked) {
                Ok(surface) => bodies.push(WaterBody { polygon, surface }),
                Err(err) => log::debug!("Skipping water polygon: {}", err),
            }
        }
        bodies
    }
}

/// `field` without its outer `pad` nodes, placed exactly on `spec`
fn crop_to(field: &Heightfield, spec: GridSpec, pad: usize) -> Heightfield {
    Heightfield::new(spec, field.crop(pad).values().to_vec())
}

fn crop_mask(mask: &[bool], outer: &GridSpec, pad: usize) -> Vec<bool> {
    let cols = outer.cols - 2 * pad;
    (pad..outer.rows - pad)
        .flat_map(|j| {
            let start = outer.index(pad, j);
            mask[start..start + cols].iter().copied()
        })
        .collect()
}

/// Median of the finite values, or zero when there are none
fn finite_median(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    finite[finite.len() / 2]
}

fn replace_non_finite(values: &mut [f64]) -> usize {
    let bad = values.iter().filter(|v| !v.is_finite()).count();
    if bad > 0 {
        let fill = finite_median(values);
        log::warn!("Replacing {} non-finite elevation samples with {:.2}", bad, fill);
        for v in values.iter_mut().filter(|v| !v.is_finite()) {
            *v = fill;
        }
    }
    bad
}

/// Final cleanup: no non-finite values, and a perfectly flat field gets a
/// small ripple on its unlocked samples so downstream meshing never sees a
/// zero height range. The ripple depends only on local position.
pub fn sanitize(field: &mut Heightfield, locked: &[bool]) {
    replace_non_finite(field.values_mut());
    if field.range() >= DEGENERATE_RANGE {
        return;
    }
    let spec = *field.spec();
    for j in 0..spec.rows {
        for i in 0..spec.cols {
            let idx = spec.index(i, j);
            if locked[idx] {
                continue;
            }
            let (x, y) = spec.node_position(i, j);
            let ripple = 0.5 * FLAT_RIPPLE * ((x * 0.37).sin() * (y * 0.53).cos() + 1.0);
            field.values_mut()[idx] += ripple;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FootprintKind;
    use crate::elevation::ElevationRaster;
    use crate::terrain::raster::covered_samples;

    struct BrokenSampler;

    impl ElevationSampler for BrokenSampler {
        fn name(&self) -> &str {
            "broken"
        }

        fn sample(&self, _grid: &SampleGrid, _zoom: u8) -> Result<ElevationRaster, ElevationError> {
            Err(ElevationError::Unavailable("offline".into()))
        }
    }

    /// Returns the raster transposed, which is the classic row/col mix-up
    struct TransposingSampler;

    impl ElevationSampler for TransposingSampler {
        fn name(&self) -> &str {
            "transposing"
        }

        fn sample(&self, grid: &SampleGrid, _zoom: u8) -> Result<ElevationRaster, ElevationError> {
            Ok(ElevationRaster::new(
                grid.cols,
                grid.rows,
                vec![0.0; grid.rows * grid.cols],
            ))
        }
    }

    fn anchor() -> CoordinateAnchor {
        CoordinateAnchor::new(47.37, 8.54)
    }

    fn config() -> TerrainConfig {
        TerrainConfig {
            resolution: 41,
            ..Default::default()
        }
    }

    fn square(cx: f64, cy: f64, half: f64) -> Vec<(f64, f64)> {
        vec![
            (cx - half, cy - half),
            (cx + half, cy - half),
            (cx + half, cy + half),
            (cx - half, cy + half),
        ]
    }

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let anchor = anchor();
        let config = config();
        let fallback = SyntheticTerrain::default();
        let builder = HeightfieldBuilder::new(&anchor, None, &config, &TransposingSampler, &fallback);
        let err = builder
            .build(
                Bounds::new(0.0, 0.0, 400.0, 200.0),
                TerrainFootprints::default(),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, TerrainError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_sampler_failure_falls_back() {
        let anchor = anchor();
        let config = config();
        let fallback = SyntheticTerrain::default();
        let builder = HeightfieldBuilder::new(&anchor, None, &config, &BrokenSampler, &fallback);
        let surface = builder
            .build(
                Bounds::new(-200.0, -200.0, 200.0, 200.0),
                TerrainFootprints::default(),
                &CancelToken::new(),
            )
            .unwrap();
        assert!(surface.degraded);
        assert!(surface.carved.field().values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_relative_heights_use_reference() {
        let anchor = anchor();
        let config = TerrainConfig {
            vertical_scale: 2.0,
            baseline_offset: 3.0,
            ..config()
        };
        let sampler = SyntheticTerrain::flat(110.0);
        let fallback = SyntheticTerrain::default();
        let builder = HeightfieldBuilder::new(
            &anchor,
            Some(ElevationReference::new(100.0)),
            &config,
            &sampler,
            &fallback,
        );
        let surface = builder
            .build(
                Bounds::new(-100.0, -100.0, 100.0, 100.0),
                TerrainFootprints::default(),
                &CancelToken::new(),
            )
            .unwrap();
        // (110 - 100) * 2 + 3, plus at most the flat-zone ripple
        let h = surface.carved.height_at(0.0, 0.0);
        assert!(h >= 23.0 && h <= 23.0 + FLAT_RIPPLE + 1e-9);
        assert!(surface.carved.field().range() > 0.0);
    }

    #[test]
    fn test_flattened_footprint_has_zero_variance() {
        let anchor = anchor();
        let config = config();
        let sampler = SyntheticTerrain::new(300.0, 40.0, 300.0);
        let fallback = SyntheticTerrain::default();
        let builder = HeightfieldBuilder::new(&anchor, None, &config, &sampler, &fallback);
        let buildings = vec![FootprintPolygon::building(square(30.0, -20.0, 45.0))];
        let surface = builder
            .build(
                Bounds::new(-200.0, -200.0, 200.0, 200.0),
                TerrainFootprints {
                    buildings: &buildings,
                    ..Default::default()
                },
                &CancelToken::new(),
            )
            .unwrap();

        let field = surface.carved.field();
        let poly = buildings[0].to_geo().unwrap();
        let covered = covered_samples(field.spec(), &poly);
        assert!(covered.len() > 4);
        let first = field.values()[covered[0]];
        assert!(covered.iter().all(|&idx| field.values()[idx] == first));
    }

    #[test]
    fn test_water_carved_below_original_minimum() {
        let anchor = anchor();
        let config = config();
        let sampler = SyntheticTerrain::new(300.0, 40.0, 300.0);
        let fallback = SyntheticTerrain::default();
        let builder = HeightfieldBuilder::new(&anchor, None, &config, &sampler, &fallback);
        let water = vec![FootprintPolygon::water(square(-50.0, 40.0, 60.0))];
        let surface = builder
            .build(
                Bounds::new(-200.0, -200.0, 200.0, 200.0),
                TerrainFootprints {
                    water: &water,
                    ..Default::default()
                },
                &CancelToken::new(),
            )
            .unwrap();

        let carved = surface.carved.field();
        let original = surface.original.field();
        let poly = water[0].to_geo().unwrap();
        let covered = covered_samples(carved.spec(), &poly);
        let min_original = covered
            .iter()
            .map(|&idx| original.values()[idx])
            .fold(f64::INFINITY, f64::min);
        for &idx in &covered {
            assert!(carved.values()[idx] <= min_original - config.water_depth + 1e-12);
        }
        assert_eq!(surface.water.len(), 1);
        assert_eq!(surface.water[0].surface, min_original);
        assert_eq!(surface.water_surface_at(-50.0, 40.0), Some(min_original));
        assert_eq!(surface.water_surface_at(150.0, -150.0), None);
    }

    #[test]
    fn test_footprint_across_zone_edge_matches_on_both_sides() {
        let anchor = anchor();
        let config = config();
        let sampler = SyntheticTerrain::new(300.0, 40.0, 300.0);
        let fallback = SyntheticTerrain::default();
        let builder = HeightfieldBuilder::new(
            &anchor,
            Some(ElevationReference::new(250.0)),
            &config,
            &sampler,
            &fallback,
        );
        let roads = vec![FootprintPolygon::new(
            FootprintKind::Road,
            vec![(-150.0, -8.0), (150.0, -8.0), (150.0, 8.0), (-150.0, 8.0)],
        )];
        let buildings = vec![FootprintPolygon::building(square(0.0, 60.0, 25.0))];
        let water = vec![FootprintPolygon::water(square(20.0, -60.0, 30.0))];
        let footprints = TerrainFootprints {
            buildings: &buildings,
            roads: &roads,
            water: &water,
        };
        let build = |bounds: Bounds| builder.build(bounds, footprints, &CancelToken::new()).unwrap();
        let west = build(Bounds::new(-200.0, -100.0, 0.0, 100.0));
        let east = build(Bounds::new(0.0, -100.0, 200.0, 100.0));

        for k in 0..=40 {
            let y = -100.0 + 5.0 * k as f64;
            let (a, b) = (west.carved.height_at(0.0, y), east.carved.height_at(0.0, y));
            assert!((a - b).abs() < 1e-9, "edge mismatch at y={}: {} vs {}", y, a, b);
        }
        assert_eq!(west.water[0].surface, east.water[0].surface);
    }

    #[test]
    fn test_degenerate_footprints_are_skipped() {
        let anchor = anchor();
        let config = config();
        let sampler = SyntheticTerrain::default();
        let fallback = SyntheticTerrain::default();
        let builder = HeightfieldBuilder::new(&anchor, None, &config, &sampler, &fallback);
        let buildings = vec![
            FootprintPolygon::building(vec![(0.0, 0.0), (1.0, 1.0)]),
            FootprintPolygon::building(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
        ];
        let result = builder.build(
            Bounds::new(-100.0, -100.0, 100.0, 100.0),
            TerrainFootprints {
                buildings: &buildings,
                ..Default::default()
            },
            &CancelToken::new(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_cancelled_before_work() {
        let anchor = anchor();
        let config = config();
        let sampler = SyntheticTerrain::default();
        let fallback = SyntheticTerrain::default();
        let builder = HeightfieldBuilder::new(&anchor, None, &config, &sampler, &fallback);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = builder
            .build(
                Bounds::new(-100.0, -100.0, 100.0, 100.0),
                TerrainFootprints::default(),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, TerrainError::Cancelled));
    }

    #[test]
    fn test_sanitize_replaces_nan_and_adds_ripple() {
        let spec = GridSpec::for_bounds(Bounds::new(0.0, 0.0, 100.0, 100.0), 10).unwrap();
        let mut field = Heightfield::filled(spec, 5.0);
        field.values_mut()[3] = f64::NAN;
        let mut locked = vec![false; spec.len()];
        locked[0] = true;
        sanitize(&mut field, &locked);
        assert!(field.values().iter().all(|v| v.is_finite()));
        assert_eq!(field.values()[0], 5.0);
        assert!(field.range() > DEGENERATE_RANGE);
        assert!(field.range() <= FLAT_RIPPLE + 1e-12);
    }

    #[test]
    fn test_survey_takes_minimum() {
        let anchor = anchor();
        let sampler = SyntheticTerrain::new(200.0, 30.0, 500.0);
        let bounds = Bounds::new(-1000.0, -1000.0, 1000.0, 1000.0);
        let reference = ElevationReference::survey(&sampler, &anchor, bounds).unwrap();
        assert!(reference.meters < 200.0);
        assert!(reference.meters >= 200.0 - 30.0 * 1.25);
    }
}
