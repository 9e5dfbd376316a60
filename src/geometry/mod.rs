pub mod polygon;
pub mod projection;
pub mod scaling;
pub mod simplify;

pub use projection::{CoordinateAnchor, UtmZone, check_coordinates};
pub use scaling::{Bounds, Scaler};
