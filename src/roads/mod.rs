//! Road network: bridge classification, flattening footprints and meshing.

pub mod classify;
pub mod footprint;
pub mod mesher;
pub mod pillars;
pub mod span;

pub use classify::BridgeClassifier;
pub use footprint::road_footprints;
pub use mesher::{RoadMeshes, RoadNetworkMesher};
pub use span::BridgeSpan;
