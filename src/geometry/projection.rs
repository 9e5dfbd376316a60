//! Geographic ⇄ projected ⇄ local coordinate conversion.
//!
//! Points are projected with transverse Mercator (UTM) into a metric frame and
//! then shifted so that the session anchor sits at the local origin. Every zone
//! of a session must go through the same [`CoordinateAnchor`], otherwise tiles
//! stop lining up at their borders.

use crate::error::TerrainError;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone: number 1..=60 and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    /// Pick the standard zone containing the given point.
    ///
    /// The Norway/Svalbard zone exceptions are not applied.
    pub fn containing(lat: f64, lon: f64) -> Self {
        let lon = normalize_longitude(lon);
        let number = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Self {
            number,
            north: lat >= 0.0,
        }
    }

    /// Longitude of the zone's central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        (self.number as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    /// EPSG code of the WGS84 / UTM zone.
    pub fn epsg(&self) -> u32 {
        if self.north {
            32600 + self.number as u32
        } else {
            32700 + self.number as u32
        }
    }

    /// Forward transverse Mercator: (lat, lon) → (easting, northing).
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        let e2 = 2.0 * WGS84_F - WGS84_F * WGS84_F;
        let e_prime2 = e2 / (1.0 - e2);

        let lat_rad = lat.to_radians();
        let dlon = normalize_longitude(lon - self.central_meridian()).to_radians();

        let n = WGS84_A / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();
        let t = lat_rad.tan();
        let c = e_prime2 * lat_rad.cos().powi(2);
        let a_coeff = dlon * lat_rad.cos();

        let e2_2 = e2 * e2;
        let e2_3 = e2_2 * e2;
        let m = WGS84_A
            * ((1.0 - e2 / 4.0 - 3.0 * e2_2 / 64.0 - 5.0 * e2_3 / 256.0) * lat_rad
                - (3.0 * e2 / 8.0 + 3.0 * e2_2 / 32.0 + 45.0 * e2_3 / 1024.0)
                    * (2.0 * lat_rad).sin()
                + (15.0 * e2_2 / 256.0 + 45.0 * e2_3 / 1024.0) * (4.0 * lat_rad).sin()
                - (35.0 * e2_3 / 3072.0) * (6.0 * lat_rad).sin());

        let easting = UTM_K0
            * n
            * (a_coeff
                + (1.0 - t * t + c) * a_coeff.powi(3) / 6.0
                + (5.0 - 18.0 * t * t + t.powi(4) + 72.0 * c - 58.0 * e_prime2)
                    * a_coeff.powi(5)
                    / 120.0)
            + FALSE_EASTING;

        let mut northing = UTM_K0
            * (m + n
                * t
                * (a_coeff.powi(2) / 2.0
                    + (5.0 - t * t + 9.0 * c + 4.0 * c * c) * a_coeff.powi(4) / 24.0
                    + (61.0 - 58.0 * t * t + t.powi(4) + 600.0 * c - 330.0 * e_prime2)
                        * a_coeff.powi(6)
                        / 720.0));
        if !self.north {
            northing += FALSE_NORTHING_SOUTH;
        }

        (easting, northing)
    }

    /// Inverse transverse Mercator: (easting, northing) → (lat, lon).
    pub fn unproject(&self, easting: f64, northing: f64) -> (f64, f64) {
        let e2 = 2.0 * WGS84_F - WGS84_F * WGS84_F;
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
        let e_prime2 = e2 / (1.0 - e2);

        let x = easting - FALSE_EASTING;
        let y = if self.north {
            northing
        } else {
            northing - FALSE_NORTHING_SOUTH
        };

        let m = y / UTM_K0;
        let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let n1 = WGS84_A / (1.0 - e2 * phi1.sin().powi(2)).sqrt();
        let t1 = phi1.tan();
        let c1 = e_prime2 * phi1.cos().powi(2);
        let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * phi1.sin().powi(2)).powf(1.5);
        let d = x / (n1 * UTM_K0);

        let lat = phi1
            - (n1 * t1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * e_prime2)
                        * d.powi(4)
                        / 24.0
                    + (61.0 + 90.0 * t1 * t1 + 298.0 * c1 + 45.0 * t1.powi(4)
                        - 252.0 * e_prime2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);

        let lon = (d - (1.0 + 2.0 * t1 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 * t1 - 3.0 * c1 * c1
                + 8.0 * e_prime2
                + 24.0 * t1.powi(4))
                * d.powi(5)
                / 120.0)
            / phi1.cos();

        (
            lat.to_degrees(),
            normalize_longitude(lon.to_degrees() + self.central_meridian()),
        )
    }
}

/// Wrap into [-180, 180). Non-finite input stays non-finite.
fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Reject coordinates that cannot anchor a session
pub fn check_coordinates(lat: f64, lon: f64) -> Result<(), TerrainError> {
    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    if valid {
        Ok(())
    } else {
        Err(TerrainError::InvalidCoordinates { lat, lon })
    }
}

/// Shared origin of a multi-zone session.
///
/// Local coordinates are `projected(point) - origin`, in meters, x east and
/// y north. The anchor is deliberately not `Clone`: a session owns exactly one
/// and hands out references.
#[derive(Debug)]
pub struct CoordinateAnchor {
    lat: f64,
    lon: f64,
    zone: UtmZone,
    origin: (f64, f64),
}

impl CoordinateAnchor {
    /// Anchor the local frame at the given WGS84 coordinates.
    pub fn new(lat: f64, lon: f64) -> Self {
        let zone = UtmZone::containing(lat, lon);
        let origin = zone.project(lat, lon);
        Self {
            lat,
            lon,
            zone,
            origin,
        }
    }

    pub fn reference(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Projected coordinates of the local origin.
    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn to_local(&self, projected_x: f64, projected_y: f64) -> (f64, f64) {
        (projected_x - self.origin.0, projected_y - self.origin.1)
    }

    pub fn to_projected(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.origin.0, y + self.origin.1)
    }

    /// (lat, lon) → local meters.
    pub fn from_geographic(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (px, py) = self.zone.project(lat, lon);
        self.to_local(px, py)
    }

    /// Local meters → (lat, lon).
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        let (px, py) = self.to_projected(x, y);
        self.zone.unproject(px, py)
    }
}
