use serde::Deserialize;
use std::time::Duration;

use crate::config::ElevationConfig;
use crate::elevation::{ElevationRaster, ElevationSampler, SampleGrid};
use crate::error::ElevationError;

const USER_AGENT: &str = concat!("zonemesh/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    results: Vec<LookupResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    /// `null` where the dataset has no coverage
    elevation: Option<f64>,
}

/// Elevation from an OpenTopoData server.
///
/// Points are sent in batches of `batch_size` as `lat,lon|lat,lon|...`.
/// Missing values come back as NaN and are filled by the heightfield builder.
pub struct OpenTopoDataSampler {
    client: reqwest::blocking::Client,
    url: String,
    dataset: Option<String>,
    batch_size: usize,
    interval: Duration,
    zoom: Option<u8>,
}

impl OpenTopoDataSampler {
    pub fn new(config: &ElevationConfig) -> Result<Self, ElevationError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            dataset: config.dataset.clone(),
            batch_size: config.batch_size.clamp(1, 100),
            interval: Duration::from_millis(config.request_interval_ms),
            zoom: config.zoom,
        })
    }

    /// 30 m SRTM where the caller needs street-level detail, 90 m otherwise
    pub fn dataset_for_zoom(zoom: u8) -> &'static str {
        if zoom >= 13 { "srtm30m" } else { "srtm90m" }
    }

    fn dataset(&self, zoom: u8) -> String {
        match &self.dataset {
            Some(name) => name.clone(),
            None => Self::dataset_for_zoom(self.zoom.unwrap_or(zoom)).to_string(),
        }
    }

    fn lookup(&self, dataset: &str, points: &[(f64, f64)]) -> Result<Vec<f64>, ElevationError> {
        let url = format!("{}/{}", self.url, dataset);
        let response: LookupResponse = self
            .client
            .get(&url)
            .query(&[("locations", locations_param(points))])
            .send()?
            .error_for_status()?
            .json()?;
        parse_lookup(response, points.len())
    }
}

fn locations_param(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(lat, lon)| format!("{:.7},{:.7}", lat, lon))
        .collect::<Vec<_>>()
        .join("|")
}

fn parse_lookup(response: LookupResponse, expected: usize) -> Result<Vec<f64>, ElevationError> {
    if response.status != "OK" {
        return Err(ElevationError::Response(
            response.error.unwrap_or(response.status),
        ));
    }
    if response.results.len() != expected {
        return Err(ElevationError::Response(format!(
            "asked for {} points, got {}",
            expected,
            response.results.len()
        )));
    }
    Ok(response
        .results
        .into_iter()
        .map(|r| r.elevation.unwrap_or(f64::NAN))
        .collect())
}

impl ElevationSampler for OpenTopoDataSampler {
    fn name(&self) -> &str {
        "opentopodata"
    }

    fn sample(&self, grid: &SampleGrid, zoom: u8) -> Result<ElevationRaster, ElevationError> {
        let dataset = self.dataset(zoom);
        let batches = grid.len().div_ceil(self.batch_size);
        log::info!(
            "Fetching {} elevations from {} ({} requests)",
            grid.len(),
            dataset,
            batches
        );
        let mut values = Vec::with_capacity(grid.len());
        for (n, chunk) in grid.points.chunks(self.batch_size).enumerate() {
            if n > 0 && !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
            values.extend(self.lookup(&dataset, chunk)?);
            log::debug!("Elevation batch {}/{}", n + 1, batches);
        }
        Ok(ElevationRaster::new(grid.rows, grid.cols, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_for_zoom() {
        assert_eq!(OpenTopoDataSampler::dataset_for_zoom(15), "srtm30m");
        assert_eq!(OpenTopoDataSampler::dataset_for_zoom(13), "srtm30m");
        assert_eq!(OpenTopoDataSampler::dataset_for_zoom(10), "srtm90m");
    }

    #[test]
    fn test_configured_dataset_wins() {
        let config = ElevationConfig {
            dataset: Some("eudem25m".to_string()),
            ..Default::default()
        };
        let sampler = OpenTopoDataSampler::new(&config).unwrap();
        assert_eq!(sampler.dataset(8), "eudem25m");

        let sampler = OpenTopoDataSampler::new(&ElevationConfig::default()).unwrap();
        assert_eq!(sampler.dataset(14), "srtm30m");
    }

    #[test]
    fn test_locations_param() {
        let param = locations_param(&[(47.5, 8.25), (-33.0, 151.0)]);
        assert_eq!(param, "47.5000000,8.2500000|-33.0000000,151.0000000");
    }

    #[test]
    fn test_parse_lookup_fills_gaps_with_nan() {
        let json = r#"{
            "status": "OK",
            "results": [
                {"elevation": 410.5, "location": {"lat": 47.0, "lng": 8.0}, "dataset": "srtm30m"},
                {"elevation": null, "location": {"lat": 47.1, "lng": 8.0}, "dataset": "srtm30m"}
            ]
        }"#;
        let response: LookupResponse = serde_json::from_str(json).unwrap();
        let values = parse_lookup(response, 2).unwrap();
        assert_eq!(values[0], 410.5);
        assert!(values[1].is_nan());
    }

    #[test]
    fn test_parse_lookup_errors() {
        let json = r#"{"status": "INVALID_REQUEST", "error": "Too many locations"}"#;
        let response: LookupResponse = serde_json::from_str(json).unwrap();
        let err = parse_lookup(response, 3).unwrap_err();
        assert!(err.to_string().contains("Too many locations"));

        let json = r#"{"status": "OK", "results": [{"elevation": 1.0}]}"#;
        let response: LookupResponse = serde_json::from_str(json).unwrap();
        assert!(parse_lookup(response, 2).is_err());
    }
}
