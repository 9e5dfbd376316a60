use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::OverpassConfig;
use crate::geometry::{Bounds, CoordinateAnchor};

const USER_AGENT: &str = concat!("zonemesh/", env!("CARGO_PKG_VERSION"));

/// Raw Overpass API response
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    pub elements: Vec<Element>,
}

/// A single element from Overpass (node or way)
#[derive(Debug, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: u64,
    #[serde(default)]
    pub nodes: Option<Vec<u64>>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

/// Geographic box (south, west, north, east) covering local `bounds`.
///
/// All four corners are unprojected because grid north and true north differ
/// away from the UTM central meridian.
pub fn geographic_bbox(anchor: &CoordinateAnchor, bounds: &Bounds) -> (f64, f64, f64, f64) {
    let corners = [
        (bounds.min_x, bounds.min_y),
        (bounds.max_x, bounds.min_y),
        (bounds.max_x, bounds.max_y),
        (bounds.min_x, bounds.max_y),
    ];
    let mut south = f64::INFINITY;
    let mut west = f64::INFINITY;
    let mut north = f64::NEG_INFINITY;
    let mut east = f64::NEG_INFINITY;
    for (x, y) in corners {
        let (lat, lon) = anchor.to_geographic(x, y);
        south = south.min(lat);
        north = north.max(lat);
        west = west.min(lon);
        east = east.max(lon);
    }
    (south, west, north, east)
}

/// Overpass QL for roads, water areas and buildings inside a box
pub fn features_query(bbox: (f64, f64, f64, f64), timeout_secs: u64) -> String {
    let (south, west, north, east) = bbox;
    let b = format!("{south},{west},{north},{east}");
    // Server-side timeout stays below the client timeout
    let server_timeout = timeout_secs.saturating_sub(20).max(25);
    format!(
        r#"[out:json][timeout:{server_timeout}];
(
  way["highway"]({b});
  way["natural"="water"]({b});
  way["waterway"="riverbank"]({b});
  way["landuse"~"reservoir|basin"]({b});
  way["building"]({b});
);
out body;
>;
out skel qt;"#
    )
}

/// Fetch roads, water and buildings covering `bounds`
pub fn fetch_features(
    config: &OverpassConfig,
    anchor: &CoordinateAnchor,
    bounds: &Bounds,
) -> Result<OverpassResponse> {
    let query = features_query(geographic_bbox(anchor, bounds), config.timeout_secs);
    execute_overpass_query(config, &query)
}

/// Try every mirror in turn; overloaded mirrors (429/504) are retried with a
/// growing pause
fn execute_overpass_query(config: &OverpassConfig, query: &str) -> Result<OverpassResponse> {
    if config.urls.is_empty() {
        bail!("No Overpass endpoints configured");
    }
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to create HTTP client")?;

    let mut errors = Vec::new();
    for attempt in 0..config.max_retries.max(1) {
        if attempt > 0 {
            let wait_secs = 30 * attempt as u64;
            log::warn!(
                "All Overpass mirrors busy, retrying in {} seconds (attempt {}/{})",
                wait_secs,
                attempt + 1,
                config.max_retries
            );
            std::thread::sleep(Duration::from_secs(wait_secs));
        }

        for url in &config.urls {
            log::debug!("Querying {}", url);
            // Overpass expects form-encoded `data=<query>`
            let response = match client.post(url).form(&[("data", query)]).send() {
                Ok(response) => response,
                Err(e) => {
                    errors.push(format!("{url}: {e}"));
                    continue;
                }
            };

            match response.status().as_u16() {
                200 => {
                    let result: OverpassResponse = response
                        .json()
                        .context("Failed to parse Overpass JSON response")?;
                    log::info!("Overpass returned {} elements", result.elements.len());
                    return Ok(result);
                }
                status => {
                    errors.push(format!("{url}: HTTP {status}"));
                    if !matches!(status, 429 | 504) {
                        log::warn!("Overpass mirror {} returned {}", url, status);
                    }
                }
            }
        }
    }

    bail!(
        "Overpass API failed after {} rounds: {}",
        config.max_retries.max(1),
        errors.join(" | ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_bbox() {
        let anchor = CoordinateAnchor::new(37.7749, -122.4194);
        let (south, west, north, east) =
            geographic_bbox(&anchor, &Bounds::around((0.0, 0.0), 10_000.0));

        // 10 km either way is roughly ±0.09 degrees of latitude
        assert!((north - south - 0.18).abs() < 0.01);
        // Longitude spread is larger because of cos(lat)
        assert!(east - west > north - south);
        assert!(south < 37.7749 && 37.7749 < north);
        assert!(west < -122.4194 && -122.4194 < east);
    }

    #[test]
    fn test_features_query() {
        let query = features_query((1.0, 2.0, 3.0, 4.0), 200);
        assert!(query.contains("[timeout:180]"));
        assert!(query.contains(r#"way["highway"](1,2,3,4);"#));
        assert!(query.contains(r#"way["building"](1,2,3,4);"#));
        assert!(query.contains(r#"way["natural"="water"]"#));
    }

    #[test]
    fn test_parse_overpass_response() {
        let json = r#"{
            "elements": [
                {"type": "node", "id": 1, "lat": 37.77, "lon": -122.42},
                {"type": "way", "id": 2, "nodes": [1, 3], "tags": {"highway": "primary"}}
            ]
        }"#;

        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.elements.len(), 2);
        assert_eq!(response.elements[0].type_, "node");
        assert_eq!(response.elements[1].type_, "way");
    }
}
