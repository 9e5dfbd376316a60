use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::RoadClass;

/// Model-space constants shared by the defaults below.
///
/// Heights are expressed in model units: meters of relief multiplied by the
/// vertical scale. Horizontal coordinates stay in local meters until export.
pub mod model {
    /// Below this height range a zone is considered perfectly flat
    pub const DEGENERATE_RANGE: f64 = 1e-6;
    /// Amplitude of the deterministic ripple injected into flat zones
    pub const FLAT_RIPPLE: f64 = 0.01;
    /// Minimum samples per grid axis
    pub const MIN_GRID_SAMPLES: usize = 10;
}

fn default_resolution() -> usize {
    200
}
fn default_vertical_scale() -> f64 {
    1.0
}
fn default_baseline_offset() -> f64 {
    2.0
}
fn default_road_quantile() -> f64 {
    0.3
}
fn default_water_depth() -> f64 {
    2.0
}
fn default_flatten_chunk() -> f64 {
    40.0
}
fn default_seam_padding() -> f64 {
    300.0
}
fn default_true() -> bool {
    true
}

/// Heightfield construction parameters
#[derive(Debug, Clone, Deserialize)]
pub struct TerrainConfig {
    /// Samples along the longer side of a zone
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_vertical_scale")]
    pub vertical_scale: f64,
    /// Lift applied after normalization so the lowest point stays above the base
    #[serde(default = "default_baseline_offset")]
    pub baseline_offset: f64,
    /// Gaussian sigma in grid cells; `None` picks one from the resolution
    #[serde(default)]
    pub smoothing_sigma: Option<f64>,
    /// Quantile of covered samples used as the flat height under roads
    #[serde(default = "default_road_quantile")]
    pub road_quantile: f64,
    /// Depression depth under water polygons, in model units
    #[serde(default = "default_water_depth")]
    pub water_depth: f64,
    /// Roads are flattened in chunks of at most this many meters
    #[serde(default = "default_flatten_chunk")]
    pub flatten_chunk_length: f64,
    /// How far (meters) a zone grid may reach past its bounds so footprints
    /// crossing the edge are flattened and carved from their full extent
    #[serde(default = "default_seam_padding")]
    pub seam_padding: f64,
    #[serde(default = "default_true")]
    pub flatten_buildings: bool,
    #[serde(default = "default_true")]
    pub flatten_roads: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            vertical_scale: default_vertical_scale(),
            baseline_offset: default_baseline_offset(),
            smoothing_sigma: None,
            road_quantile: default_road_quantile(),
            water_depth: default_water_depth(),
            flatten_chunk_length: default_flatten_chunk(),
            seam_padding: default_seam_padding(),
            flatten_buildings: true,
            flatten_roads: true,
        }
    }
}

impl TerrainConfig {
    /// Smoothing sigma in cells. Coarse grids get more blur so the mesh does
    /// not look faceted.
    pub fn effective_sigma(&self) -> f64 {
        match self.smoothing_sigma {
            Some(sigma) => sigma.max(0.0),
            None if self.resolution < 80 => 1.5,
            None if self.resolution < 200 => 1.0,
            None => 0.6,
        }
    }
}

fn default_road_scale() -> f64 {
    1.0
}
fn default_min_printable_width_mm() -> f64 {
    0.8
}
fn default_road_thickness() -> f64 {
    1.0
}
fn default_embed_depth() -> f64 {
    0.3
}
fn default_pontoon_threshold() -> f64 {
    0.5
}
fn default_pontoon_lift() -> f64 {
    0.2
}
fn default_arc_segments() -> usize {
    8
}

/// Road widths (meters) per class and road mesh parameters
#[derive(Debug, Clone, Deserialize)]
pub struct RoadConfig {
    #[serde(default)]
    pub widths: RoadWidths,
    /// Road width multiplier
    #[serde(default = "default_road_scale")]
    pub road_scale: f64,
    /// Narrowest road that still prints, in mm
    #[serde(default = "default_min_printable_width_mm")]
    pub min_printable_width_mm: f64,
    /// Output scale in mm per meter; enables the printable-width clamp
    #[serde(default)]
    pub mm_per_meter: Option<f64>,
    /// Extrusion thickness of the road slab, in model units
    #[serde(default = "default_road_thickness")]
    pub thickness: f64,
    /// How far ground roads reach below the terrain surface
    #[serde(default = "default_embed_depth")]
    pub embed_depth: f64,
    /// Carved-versus-original difference above which a vertex is lifted
    #[serde(default = "default_pontoon_threshold")]
    pub pontoon_threshold: f64,
    /// Height above the original water surface for lifted vertices
    #[serde(default = "default_pontoon_lift")]
    pub pontoon_lift: f64,
    /// Segments per half circle in buffer caps and joins
    #[serde(default = "default_arc_segments")]
    pub arc_segments: usize,
    /// Simplify centerlines before buffering
    #[serde(default = "default_true")]
    pub simplify: bool,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            widths: RoadWidths::default(),
            road_scale: default_road_scale(),
            min_printable_width_mm: default_min_printable_width_mm(),
            mm_per_meter: None,
            thickness: default_road_thickness(),
            embed_depth: default_embed_depth(),
            pontoon_threshold: default_pontoon_threshold(),
            pontoon_lift: default_pontoon_lift(),
            arc_segments: default_arc_segments(),
            simplify: true,
        }
    }
}

impl RoadConfig {
    /// Width in meters for a road class, scaled and clamped to a printable minimum
    pub fn width_for(&self, class: RoadClass) -> f64 {
        let nominal = self.widths.get(class) * self.road_scale;
        nominal.max(self.min_width())
    }

    /// Minimum width in meters implied by the output scale
    pub fn min_width(&self) -> f64 {
        match self.mm_per_meter {
            Some(mm_per_m) if mm_per_m > 0.0 => self.min_printable_width_mm / mm_per_m,
            _ => 0.0,
        }
    }

    /// Create a config with a road scale multiplier
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.road_scale = scale;
        self
    }

    /// Create a config that clamps widths for the given output scale
    pub fn with_output_scale(mut self, mm_per_meter: f64) -> Self {
        self.mm_per_meter = Some(mm_per_meter);
        self
    }
}

/// Nominal carriageway width in meters for each road class
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoadWidths {
    pub motorway: f64,
    pub primary: f64,
    pub secondary: f64,
    pub tertiary: f64,
    pub residential: f64,
    pub service: f64,
    pub path: f64,
}

impl Default for RoadWidths {
    fn default() -> Self {
        Self {
            motorway: 14.0,
            primary: 10.0,
            secondary: 8.0,
            tertiary: 7.0,
            residential: 5.5,
            service: 3.5,
            path: 2.0,
        }
    }
}

impl RoadWidths {
    pub fn get(&self, class: RoadClass) -> f64 {
        match class {
            RoadClass::Motorway => self.motorway,
            RoadClass::Primary => self.primary,
            RoadClass::Secondary => self.secondary,
            RoadClass::Tertiary => self.tertiary,
            RoadClass::Residential => self.residential,
            RoadClass::Service => self.service,
            RoadClass::Path => self.path,
        }
    }
}

/// Bridge detection and bridge geometry policy.
///
/// The thresholds are heuristics tuned on real data, not hard contracts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Minimum centerline length inside water for a geometric water crossing
    pub min_water_overlap: f64,
    /// Treat untagged roads that cross water as bridges
    pub infer_from_water: bool,
    /// Deck rise per OSM layer above the ground below
    pub layer_increment: f64,
    /// Deck rise for tagged bridges without a layer
    pub default_clearance: f64,
    /// Minimum deck height above the original water surface
    pub min_water_clearance: f64,
    /// Clearance for arch, suspension and cable-stayed bridges
    pub long_span_clearance: f64,
    pub deck_thickness: f64,
    /// Bridges are buffered at least as wide as a road of this class
    pub min_width_class: RoadClassName,
    /// Extra radius of the mask cut out of the ground road set
    pub mask_margin: f64,
    pub pillar_spacing: f64,
    /// Pillars are only placed where the deck is at least this high
    pub pillar_min_clearance: f64,
    /// Pillar side length as a fraction of the deck width
    pub pillar_width_fraction: f64,
    /// How far pillars reach below ground or water level
    pub pillar_embed: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_water_overlap: 1.0,
            infer_from_water: true,
            layer_increment: 5.0,
            default_clearance: 4.0,
            min_water_clearance: 6.0,
            long_span_clearance: 12.0,
            deck_thickness: 1.0,
            min_width_class: RoadClassName::Primary,
            mask_margin: 2.0,
            pillar_spacing: 30.0,
            pillar_min_clearance: 2.0,
            pillar_width_fraction: 0.3,
            pillar_embed: 0.5,
        }
    }
}

/// Serializable road class name for config files
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoadClassName {
    Motorway,
    Primary,
    Secondary,
    Tertiary,
    Residential,
}

impl From<RoadClassName> for RoadClass {
    fn from(name: RoadClassName) -> Self {
        match name {
            RoadClassName::Motorway => RoadClass::Motorway,
            RoadClassName::Primary => RoadClass::Primary,
            RoadClassName::Secondary => RoadClass::Secondary,
            RoadClassName::Tertiary => RoadClass::Tertiary,
            RoadClassName::Residential => RoadClass::Residential,
        }
    }
}

/// Closing the terrain surface into a solid
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolidConfig {
    /// Distance from the lowest terrain point down to the flat bottom
    pub base_thickness: f64,
    /// Vertices closer than this are merged when checking seams
    pub weld_tolerance: f64,
    /// Try to fill holes when the solid is not watertight
    pub repair: bool,
}

impl Default for SolidConfig {
    fn default() -> Self {
        Self {
            base_thickness: 2.0,
            weld_tolerance: 1e-4,
            repair: true,
        }
    }
}

/// All knobs of the per-zone pipeline
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub terrain: TerrainConfig,
    pub roads: RoadConfig,
    pub bridges: BridgeConfig,
    pub solid: SolidConfig,
}

/// Where elevation samples come from
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ElevationSourceKind {
    /// OpenTopoData HTTP API
    Opentopodata,
    /// Deterministic procedural terrain, no network
    Synthetic,
}

fn default_elevation_source() -> ElevationSourceKind {
    ElevationSourceKind::Opentopodata
}
fn default_opentopodata_url() -> String {
    "https://api.opentopodata.org/v1".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_elevation_timeout() -> u64 {
    30
}
fn default_request_interval_ms() -> u64 {
    1000
}
fn default_synthetic_base() -> f64 {
    100.0
}
fn default_synthetic_amplitude() -> f64 {
    25.0
}
fn default_synthetic_wavelength() -> f64 {
    1500.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElevationConfig {
    #[serde(default = "default_elevation_source")]
    pub source: ElevationSourceKind,
    #[serde(default = "default_opentopodata_url")]
    pub url: String,
    /// Dataset name; picked from the zoom level when unset
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_elevation_timeout")]
    pub timeout_secs: u64,
    /// Pause between batched requests; the public server allows one per second
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
    /// Fixed zoom level; derived from the grid spacing when unset
    #[serde(default)]
    pub zoom: Option<u8>,
    #[serde(default = "default_synthetic_base")]
    pub synthetic_base: f64,
    #[serde(default = "default_synthetic_amplitude")]
    pub synthetic_amplitude: f64,
    #[serde(default = "default_synthetic_wavelength")]
    pub synthetic_wavelength: f64,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            source: default_elevation_source(),
            url: default_opentopodata_url(),
            dataset: None,
            batch_size: default_batch_size(),
            timeout_secs: default_elevation_timeout(),
            request_interval_ms: default_request_interval_ms(),
            zoom: None,
            synthetic_base: default_synthetic_base(),
            synthetic_amplitude: default_synthetic_amplitude(),
            synthetic_wavelength: default_synthetic_wavelength(),
        }
    }
}

fn default_overpass_urls() -> Vec<String> {
    vec![
        "https://overpass.private.coffee/api/interpreter".to_string(),
        "https://overpass-api.de/api/interpreter".to_string(),
        "https://maps.mail.ru/osm/tools/overpass/api/interpreter".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverpassConfig {
    #[serde(default = "default_overpass_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            urls: default_overpass_urls(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_radius() -> u32 {
    1000
}
fn default_zones() -> u32 {
    2
}
fn default_size() -> f64 {
    100.0
}

/// Top-level config file contents
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default = "default_radius")]
    pub radius: u32,
    /// Zones per side of the square session area
    #[serde(default = "default_zones")]
    pub zones: u32,
    /// Printed edge length of one zone in mm
    #[serde(default = "default_size")]
    pub size: f64,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub elevation: ElevationConfig,
    #[serde(default)]
    pub overpass: Option<OverpassConfig>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            lat: None,
            lon: None,
            radius: default_radius(),
            zones: default_zones(),
            size: default_size(),
            output: None,
            verbose: false,
            pipeline: PipelineConfig::default(),
            elevation: ElevationConfig::default(),
            overpass: None,
        }
    }
}

impl FileConfig {
    pub fn load() -> Option<Self> {
        let config_paths = get_config_paths();

        for path in config_paths {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => {
                        log::debug!("Loaded config from {}", path.display());
                        return Some(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("zonemesh.toml"));
    paths.push(PathBuf::from(".zonemesh.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("zonemesh").join("config.toml"));
        paths.push(config_dir.join("zonemesh.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".zonemesh.toml"));
        paths.push(home.join(".config").join("zonemesh").join("config.toml"));
    }

    paths
}
