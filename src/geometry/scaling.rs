/// Axis-aligned bounding box in local coordinates (meters)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Square box of the given half-extent around a center point
    pub fn around(center: (f64, f64), half_extent: f64) -> Self {
        Self::new(
            center.0 - half_extent,
            center.1 - half_extent,
            center.0 + half_extent,
            center.1 + half_extent,
        )
    }

    /// Create bounds from a set of points
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut min_x = f64::MAX;
        let mut max_x = f64::MIN;
        let mut min_y = f64::MAX;
        let mut max_y = f64::MIN;

        for &(x, y) in points {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        Some(Self {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Grow (or shrink, for negative margins) on every side
    pub fn inflate(&self, margin: f64) -> Bounds {
        Bounds::new(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Finite and with positive extent on both axes
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.max_x < self.min_x
            || other.min_x > self.max_x
            || other.max_y < self.min_y
            || other.min_y > self.max_y)
    }

    /// Clamp a point into the box
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.clamp(self.min_x, self.max_x),
            y.clamp(self.min_y, self.max_y),
        )
    }
}

/// Scales local coordinates (meters) to physical print dimensions (mm)
///
/// Unlike a per-map fit, the scale is one uniform factor shared by every zone
/// of a session, so neighbouring zone files line up when placed side by side.
/// Heights are already in model units and only get the same uniform factor.
#[derive(Debug, Clone, Copy)]
pub struct Scaler {
    /// Scale factor: mm per meter
    scale: f64,
    /// Local point that maps to the model origin
    origin_x: f64,
    origin_y: f64,
}

impl Scaler {
    /// Fit `reference_extent_m` meters into `target_mm` millimeters
    pub fn for_extent(reference_extent_m: f64, target_mm: f64) -> Self {
        let scale = if reference_extent_m > 0.0 {
            target_mm / reference_extent_m
        } else {
            1.0
        };
        Self {
            scale,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }

    /// Place `origin` (local meters) at the model origin
    pub fn with_origin(mut self, origin: (f64, f64)) -> Self {
        self.origin_x = origin.0;
        self.origin_y = origin.1;
        self
    }

    /// Scale a point from meters to mm
    pub fn scale(&self, x: f64, y: f64) -> (f32, f32) {
        let scaled_x = (x - self.origin_x) * self.scale;
        let scaled_y = (y - self.origin_y) * self.scale;
        (scaled_x as f32, scaled_y as f32)
    }

    /// Scale a full 3D vertex
    pub fn scale_vertex(&self, v: [f32; 3]) -> [f32; 3] {
        let (x, y) = self.scale(v[0] as f64, v[1] as f64);
        [x, y, (v[2] as f64 * self.scale) as f32]
    }

    /// Get the scale factor (mm per meter)
    pub fn scale_factor(&self) -> f64 {
        self.scale
    }

    /// Convert a printable size in mm back into local meters
    pub fn mm_to_meters(&self, mm: f64) -> f64 {
        mm / self.scale
    }
}
