use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;

use zonemesh::api::{OpenTopoDataSampler, fetch_features};
use zonemesh::config::{ElevationConfig, ElevationSourceKind, FileConfig};
use zonemesh::elevation::{CachedSampler, ElevationSampler, MemoryCache, SyntheticTerrain};
use zonemesh::geometry::{Bounds, CoordinateAnchor, Scaler, check_coordinates};
use zonemesh::mesh::stl::estimate_stl_size;
use zonemesh::mesh::{TaggedMesh, clean_mesh, write_stl};
use zonemesh::osm::OsmExtract;
use zonemesh::session::{
    CancelToken, SessionContext, SessionInputs, ZoneLayout, ZoneReport, ZoneStatus,
    generate_zones,
};

/// Generate seamlessly tiled terrain, road and bridge meshes for 3D printing
///
/// Examples:
///   # 2x2 zones around Zurich, 1 km radius
///   zonemesh --lat 47.3769 --lon 8.5417
///
///   # 3x3 zones of 150 mm each, exaggerated relief
///   zonemesh --lat 46.948 --lon 7.447 -r 3000 -z 3 -s 150 --vertical-scale 2
///
///   # No network: synthetic terrain, no OSM features
///   zonemesh --lat 47.0 --lon 8.0 --elevation synthetic --no-osm
#[derive(Parser, Debug)]
#[command(name = "zonemesh")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches zonemesh.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Latitude of the session center
    #[arg(long, requires = "lon")]
    lat: Option<f64>,

    /// Longitude of the session center
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Half the edge length of the square session area, in meters
    #[arg(short = 'r', long)]
    radius: Option<u32>,

    /// Zones per side
    #[arg(short = 'z', long)]
    zones: Option<u32>,

    /// Heightfield samples along the longer side of a zone
    #[arg(long)]
    resolution: Option<usize>,

    /// Printed edge length of one zone in mm
    #[arg(short = 's', long)]
    size: Option<f64>,

    /// Relief exaggeration
    #[arg(long)]
    vertical_scale: Option<f64>,

    /// Elevation source
    #[arg(long, value_enum)]
    elevation: Option<ElevationSourceKind>,

    /// Output directory for the zone STL files
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Skip the OpenStreetMap download (bare terrain)
    #[arg(long)]
    no_osm: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let mut file_config = if let Some(ref config_path) = args.config {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .context(format!("Failed to read config file: {:?}", config_path))?;
            toml::from_str(&contents).context("Failed to parse config file")?
        } else {
            bail!("Config file not found: {:?}", config_path);
        }
    } else {
        FileConfig::load().unwrap_or_default()
    };

    let verbose = args.verbose || file_config.verbose;
    env_logger::Builder::from_default_env()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let (Some(lat), Some(lon)) = (args.lat.or(file_config.lat), args.lon.or(file_config.lon))
    else {
        bail!("Must provide --lat and --lon (or set them in the config file)");
    };
    check_coordinates(lat, lon)?;
    let radius = args.radius.unwrap_or(file_config.radius);
    let zones = args.zones.unwrap_or(file_config.zones);
    let size = args.size.unwrap_or(file_config.size);
    let output = args
        .output
        .clone()
        .or_else(|| file_config.output.clone())
        .unwrap_or_else(|| PathBuf::from("zones"));
    if radius == 0 || zones == 0 {
        bail!("--radius and --zones must be positive");
    }

    let mut pipeline = std::mem::take(&mut file_config.pipeline);
    if let Some(resolution) = args.resolution {
        pipeline.terrain.resolution = resolution;
    }
    if let Some(scale) = args.vertical_scale {
        pipeline.terrain.vertical_scale = scale;
    }
    if let Some(source) = args.elevation {
        file_config.elevation.source = source;
    }

    let session_bounds = Bounds::around((0.0, 0.0), radius as f64);
    let layout = ZoneLayout::grid(session_bounds, zones as usize, zones as usize)?;
    let zone_extent = layout.zone_bounds(0, 0).width();
    let scaler = Scaler::for_extent(zone_extent, size);
    pipeline.roads = pipeline.roads.with_output_scale(scaler.scale_factor());

    println!("zonemesh - Tiled Terrain Mesh Generator");
    println!("=======================================");
    println!();
    log::debug!(
        "Center ({:.4}, {:.4}), radius {} m, {}x{} zones of {:.0} m -> {:.0} mm, output {}",
        lat,
        lon,
        radius,
        zones,
        zones,
        zone_extent,
        size,
        output.display()
    );

    let anchor = CoordinateAnchor::new(lat, lon);
    log::debug!("Anchor in UTM zone {:?}", anchor.zone());

    let fallback = synthetic_terrain(&file_config.elevation);
    let remote: Box<dyn ElevationSampler> = match file_config.elevation.source {
        ElevationSourceKind::Opentopodata => Box::new(
            OpenTopoDataSampler::new(&file_config.elevation)
                .context("Failed to create elevation client")?,
        ),
        ElevationSourceKind::Synthetic => Box::new(fallback.clone()),
    };
    let sampler = CachedSampler::new(remote.as_ref(), MemoryCache::new());

    let spinner = create_spinner("Surveying session elevation...");
    let start = Instant::now();
    let ctx = SessionContext::new(anchor, pipeline)
        .with_fallback(fallback)
        .surveyed(&sampler, session_bounds);
    match ctx.reference() {
        Some(reference) => spinner.finish_with_message(format!(
            "Elevation reference {:.1} m [{:.1}s]",
            reference.meters,
            start.elapsed().as_secs_f32()
        )),
        None => spinner.finish_with_message("No elevation reference, zones normalized individually"),
    }

    let osm = if args.no_osm {
        OsmExtract::default()
    } else {
        let spinner = create_spinner("Fetching roads, water and buildings from OpenStreetMap...");
        let start = Instant::now();
        let overpass_config = file_config.overpass.clone().unwrap_or_default();
        let response = fetch_features(&overpass_config, ctx.anchor(), &session_bounds)
            .context("Failed to fetch data from Overpass API")?;
        let extract = OsmExtract::from_response(&response, ctx.anchor());
        spinner.finish_with_message(format!(
            "Fetched {} roads, {} water areas, {} buildings [{:.1}s]",
            extract.roads.len(),
            extract.water.len(),
            extract.buildings.len(),
            start.elapsed().as_secs_f32()
        ));
        extract
    };
    let inputs = SessionInputs::gather(&ctx, &layout, &osm, &osm, &osm);

    let start = Instant::now();
    let progress = ProgressBar::new(layout.zones().len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30}] {pos}/{len} zones {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let cancel = CancelToken::new();
    let reports = generate_zones(&ctx, &sampler, &inputs, &layout, &cancel, |report| {
        progress.set_message(format!("({}, {}) {:?}", report.row, report.col, report.status));
        progress.inc(1);
    });
    progress.finish_with_message(format!("[{:.1}s]", start.elapsed().as_secs_f32()));

    std::fs::create_dir_all(&output)
        .context(format!("Failed to create output directory {:?}", output))?;

    let spinner = create_spinner("Validating and writing STL files...");
    let start = Instant::now();
    let mut written = 0usize;
    let mut bytes = 0usize;
    for report in &reports {
        let Some(meshes) = &report.meshes else {
            continue;
        };
        let zone_scaler = scaler.with_origin((meshes.request.bounds.min_x, meshes.request.bounds.min_y));
        let parts = [
            meshes.terrain.to_tagged(),
            meshes.roads.ground.clone(),
            meshes.roads.bridges.clone(),
            meshes.roads.supports.clone(),
        ];
        for part in parts {
            if let Some(size) = write_part(&output, report, part, &zone_scaler)? {
                written += 1;
                bytes += size;
            }
        }
        if !meshes.terrain.watertight {
            log::warn!(
                "Zone ({}, {}) terrain is not watertight",
                report.row,
                report.col
            );
        }
    }
    spinner.finish_with_message(format!(
        "Wrote {} files ({:.1} KB) [{:.1}s]",
        written,
        bytes as f64 / 1024.0,
        start.elapsed().as_secs_f32()
    ));

    println!();
    print_summary(&reports);
    println!();
    println!(
        "Done! Total time: {:.1}s",
        total_start.elapsed().as_secs_f32()
    );
    println!("Output: {}", output.display());

    if reports.iter().all(|r| r.status != ZoneStatus::Completed) {
        bail!("No zone completed");
    }
    Ok(())
}

fn synthetic_terrain(config: &ElevationConfig) -> SyntheticTerrain {
    SyntheticTerrain::new(
        config.synthetic_base,
        config.synthetic_amplitude,
        config.synthetic_wavelength,
    )
}

/// Clean and write one mesh of a zone; empty meshes produce no file
fn write_part(
    dir: &Path,
    report: &ZoneReport,
    mesh: TaggedMesh,
    scaler: &Scaler,
) -> Result<Option<usize>> {
    if mesh.is_empty() {
        return Ok(None);
    }
    let role = mesh.role;
    let (cleaned, _) = clean_mesh(mesh);
    let path = dir.join(format!(
        "zone_{}_{}_{}.stl",
        report.row,
        report.col,
        role.file_suffix()
    ));
    write_stl(&path, &cleaned.triangles, scaler)
        .context(format!("Failed to write {}", path.display()))?;
    log::debug!("Wrote {} ({} triangles)", path.display(), cleaned.len());
    Ok(Some(estimate_stl_size(cleaned.len())))
}

fn print_summary(reports: &[ZoneReport]) {
    println!("Zones");
    println!("=====");
    for report in reports {
        let detail = match (&report.status, &report.meshes) {
            (ZoneStatus::Completed, Some(meshes)) => format!(
                "terrain {} / roads {} / bridges {} ({} spans) / supports {}{}",
                meshes.terrain.mesh.faces.len(),
                meshes.roads.ground.len(),
                meshes.roads.bridges.len(),
                meshes.roads.spans.len(),
                meshes.roads.supports.len(),
                if meshes.surface.degraded {
                    " [fallback terrain]"
                } else {
                    ""
                }
            ),
            (ZoneStatus::Failed(message), _) => format!("FAILED: {}", message),
            (ZoneStatus::Cancelled, _) => "cancelled".to_string(),
            (ZoneStatus::Completed, None) => String::new(),
        };
        println!("  ({}, {}) {}", report.row, report.col, detail);
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
