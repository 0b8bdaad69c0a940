use crate::map::{JunctionID, LaneRef};
use geom::PolyLine3;
use serde::{Deserialize, Serialize};

/// Directed edge from the last point of a lane to the first point of another, across a junction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Connector {
    pub junction: JunctionID,
    pub from: LaneRef,
    pub from_point: usize,
    pub to: LaneRef,
    pub to_point: usize,
    pub points: PolyLine3,
}
