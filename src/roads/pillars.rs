use super::span::BridgeSpan;
use crate::config::BridgeConfig;
use crate::geometry::Bounds;
use crate::geometry::polygon::stations_along;
use crate::mesh::{IndexedMesh, extrude_flat};
use crate::terrain::TerrainSurface;

/// Square support pillars under a deck.
///
/// Stations sit every `pillar_spacing` meters along each centerline. A pillar
/// is placed where the deck underside is more than `pillar_min_clearance`
/// above the ground or water below, and reaches `pillar_embed` below that
/// level. Only stations inside `zone` are used.
pub fn pillars_for(
    span: &BridgeSpan,
    surface: &TerrainSurface,
    config: &BridgeConfig,
    zone: &Bounds,
) -> Vec<IndexedMesh> {
    let half = (span.width * config.pillar_width_fraction / 2.0).max(0.1);
    let mut out = Vec::new();
    let stations = span
        .centerlines
        .iter()
        .flat_map(|line| stations_along(line, config.pillar_spacing));
    for (x, y) in stations {
        if !zone.contains(x, y) {
            continue;
        }
        let below = surface
            .water_surface_at(x, y)
            .unwrap_or_else(|| surface.carved.height_at(x, y));
        if span.deck - below <= config.pillar_min_clearance {
            continue;
        }
        let square = [
            (x - half, y - half),
            (x + half, y - half),
            (x + half, y + half),
            (x - half, y + half),
        ];
        match extrude_flat(&square, &[], below - config.pillar_embed, span.deck) {
            Ok(mesh) => out.push(mesh),
            Err(err) => log::warn!("Skipping pillar of bridge {}: {}", span.id(), err),
        }
    }
    out
}
