use geo::{Area, Polygon};

use crate::error::GeometryError;
use crate::geometry::Bounds;
use crate::geometry::polygon::{MIN_POLYGON_AREA, to_polygon};

/// What a footprint marks on the heightfield
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootprintKind {
    Building,
    Road,
    Water,
}

/// A 2D polygon in the local frame, used to flatten or carve the heightfield
#[derive(Debug, Clone)]
pub struct FootprintPolygon {
    pub kind: FootprintKind,
    pub outer: Vec<(f64, f64)>,
    pub holes: Vec<Vec<(f64, f64)>>,
}

impl FootprintPolygon {
    pub fn new(kind: FootprintKind, outer: Vec<(f64, f64)>) -> Self {
        Self {
            kind,
            outer,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(
        kind: FootprintKind,
        outer: Vec<(f64, f64)>,
        holes: Vec<Vec<(f64, f64)>>,
    ) -> Self {
        Self { kind, outer, holes }
    }

    pub fn building(outer: Vec<(f64, f64)>) -> Self {
        Self::new(FootprintKind::Building, outer)
    }

    pub fn water(outer: Vec<(f64, f64)>) -> Self {
        Self::new(FootprintKind::Water, outer)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.outer)
    }

    /// Convert to a `geo` polygon, rejecting degenerate input
    pub fn to_geo(&self) -> Result<Polygon<f64>, GeometryError> {
        if self.outer.len() < 3 {
            return Err(GeometryError::Degenerate("fewer than three vertices"));
        }
        let finite = |pts: &[(f64, f64)]| pts.iter().all(|(x, y)| x.is_finite() && y.is_finite());
        if !finite(&self.outer) || !self.holes.iter().all(|h| finite(h)) {
            return Err(GeometryError::Degenerate("non-finite coordinate"));
        }
        let polygon = to_polygon(&self.outer, &self.holes);
        if polygon.unsigned_area() < MIN_POLYGON_AREA {
            return Err(GeometryError::Degenerate("zero area"));
        }
        Ok(polygon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_footprint() {
        let fp = FootprintPolygon::building(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert!(fp.to_geo().is_ok());
    }

    #[test]
    fn test_degenerate_footprints() {
        let two = FootprintPolygon::water(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(matches!(two.to_geo(), Err(GeometryError::Degenerate(_))));

        let collinear = FootprintPolygon::water(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(
            collinear.to_geo().unwrap_err(),
            GeometryError::Degenerate("zero area")
        );

        let nan = FootprintPolygon::building(vec![(0.0, 0.0), (f64::NAN, 1.0), (2.0, 0.0)]);
        assert!(nan.to_geo().is_err());
    }
}
