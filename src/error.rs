use thiserror::Error;

/// Errors that abort generation of a single zone.
///
/// Anything in here is an invariant violation or a condition the pipeline
/// cannot recover from locally. Skippable geometry problems use
/// [`GeometryError`] instead and never reach this type.
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error(
        "elevation raster shape mismatch: requested {expected_rows}x{expected_cols}, \
         sampler returned {rows}x{cols} with {len} values"
    )]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
        len: usize,
    },

    #[error("invalid zone bounds: {0}")]
    InvalidBounds(String),

    #[error("invalid coordinates ({lat}, {lon}): latitude must be within ±90 and longitude within ±180")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("zone generation cancelled")]
    Cancelled,

    #[error("elevation sampling failed: {0}")]
    Elevation(#[from] ElevationError),
}

/// Problems with one piece of input geometry. The caller logs and skips.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("degenerate polygon: {0}")]
    Degenerate(&'static str),

    #[error("polygon covers no grid samples")]
    NoCoverage,

    #[error("empty geometry")]
    Empty,
}

/// Failures reported by an elevation sampler.
#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("elevation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected elevation response: {0}")]
    Response(String),

    #[error("elevation source unavailable: {0}")]
    Unavailable(String),
}
