use crate::map::{
    JunctionID, LaneID, LaneKey, LaneRef, RoadID, SpawnSiteID, TrafficLightID,
};
use common::error::MultiError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failures of graph edits and invariant checks.
/// "No match" outcomes are never errors, they are plain `Option`s or `SpatialMatch::Free`.
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyError {
    /// Geometry produced fewer than two usable points for a lane
    DegenerateLane(LaneKey),
    /// A lane was registered twice for the same owner and index without being discarded
    DuplicateLane(LaneKey),
    /// An owner is missing one of its lanes after a rebuild
    MissingLane(LaneKey),
    /// A connector references a lane generation that is no longer current
    StaleConnector { from: LaneRef, to: LaneRef },
    /// A connector does not start at the last point or end at the first point
    BadConnectorPoint { lane: LaneID, point: usize },
    /// Road and junction disagree about an attachment
    BrokenAttachment { road: RoadID, junction: JunctionID },
    UnknownRoad(RoadID),
    UnknownJunction(JunctionID),
    UnknownLane(LaneID),
    UnknownTrafficLight(TrafficLightID),
    UnknownSpawnSite(SpawnSiteID),
    InvalidRoad(&'static str),
    Invariants(MultiError<TopologyError>),
}

impl Display for TopologyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyError::DegenerateLane(key) => write!(f, "degenerate lane {:?}", key),
            TopologyError::DuplicateLane(key) => {
                write!(f, "lane {:?} registered twice without removal", key)
            }
            TopologyError::MissingLane(key) => write!(f, "lane {:?} is missing", key),
            TopologyError::StaleConnector { from, to } => {
                write!(f, "connector {:?} -> {:?} references a stale lane", from, to)
            }
            TopologyError::BadConnectorPoint { lane, point } => {
                write!(f, "connector of lane {:?} uses point {}", lane, point)
            }
            TopologyError::BrokenAttachment { road, junction } => {
                write!(f, "attachment of {:?} to {:?} is one-sided", road, junction)
            }
            TopologyError::UnknownRoad(id) => write!(f, "unknown road {:?}", id),
            TopologyError::UnknownJunction(id) => write!(f, "unknown junction {:?}", id),
            TopologyError::UnknownLane(id) => write!(f, "unknown lane {:?}", id),
            TopologyError::UnknownTrafficLight(id) => write!(f, "unknown traffic light {:?}", id),
            TopologyError::UnknownSpawnSite(id) => write!(f, "unknown spawn site {:?}", id),
            TopologyError::InvalidRoad(reason) => write!(f, "invalid road: {}", reason),
            TopologyError::Invariants(errs) => {
                write!(f, "{} invariant violations:\n{}", errs.len(), errs)
            }
        }
    }
}

impl Error for TopologyError {}
