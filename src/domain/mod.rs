pub mod footprint;
pub mod road;
pub mod source;

pub use footprint::{FootprintKind, FootprintPolygon};
pub use road::{
    BridgeInfo, BridgeSignal, BridgeStructure, RawRoad, RoadClass, RoadKind, RoadSegment,
};
pub use source::{FootprintSource, RoadGraphSource, WaterSource};
