//! Interactive edit session: pointer samples accumulate into a provisional element
//! that only touches the graph on commit.

use crate::map::{
    ConnectedRoad, GridSnapper, InsertReport, JunctionID, JunctionKind, RoadEnd, RoadID,
    RoadType, SpawnSiteID, SpawnTemplate, TopologyError, TopologyGraph, TrafficLightID,
};
use geom::Vec3;
use std::error::Error;
use std::f32::consts::{FRAC_PI_2, TAU};
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq)]
pub enum Tool {
    Road(RoadType),
    Junction(JunctionKind),
    TrafficLight,
    SpawnSite(SpawnTemplate),
}

/// Element being dragged, not part of the graph yet
#[derive(Clone, Debug, PartialEq)]
pub enum Provisional {
    Road {
        road_type: RoadType,
        start: Vec3,
        end: Vec3,
    },
    Junction {
        kind: JunctionKind,
        pos: Vec3,
        rotation: f32,
    },
    TrafficLight {
        pos: Vec3,
        rotation: f32,
    },
    SpawnSite {
        template: SpawnTemplate,
        pos: Vec3,
        radius: f32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Idle,
    Dragging(Provisional),
    /// Only held while `commit` applies the provisional element. The provisional
    /// element has been taken out, so a commit can never be applied twice.
    /// `commit` always leaves the session `Idle`.
    Committing,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommitOutcome {
    Road {
        id: RoadID,
        report: InsertReport,
    },
    Junction {
        id: JunctionID,
        attached: Vec<(RoadID, RoadEnd)>,
    },
    TrafficLight(TrafficLightID),
    SpawnSite(SpawnSiteID),
    /// The provisional element was too small to be kept
    Discarded,
}

/// What the provisional element would connect to, for rendering
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Preview {
    pub roads: Vec<ConnectedRoad>,
    pub junction_slots: Vec<(JunctionID, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    /// A drag is already in progress
    Busy,
    NotDragging,
    Topology(TopologyError),
}

impl From<TopologyError> for EditError {
    fn from(e: TopologyError) -> Self {
        EditError::Topology(e)
    }
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::Busy => write!(f, "an edit is already in progress"),
            EditError::NotDragging => write!(f, "no edit in progress"),
            EditError::Topology(e) => write!(f, "{}", e),
        }
    }
}

impl Error for EditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EditError::Topology(e) => Some(e),
            _ => None,
        }
    }
}

pub struct EditSession {
    tool: Tool,
    snapper: GridSnapper,
    state: SessionState,
    rotation: f32,
    counter: usize,
}

impl EditSession {
    pub fn new(tool: Tool, snapper: GridSnapper) -> Self {
        Self {
            tool,
            snapper,
            state: SessionState::Idle,
            rotation: 0.0,
            counter: 0,
        }
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) -> Result<(), EditError> {
        if !matches!(self.state, SessionState::Idle) {
            return Err(EditError::Busy);
        }
        self.tool = tool;
        Ok(())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn provisional(&self) -> Option<&Provisional> {
        match &self.state {
            SessionState::Dragging(p) => Some(p),
            _ => None,
        }
    }

    pub fn begin_drag(&mut self, pos: Vec3) -> Result<(), EditError> {
        if !matches!(self.state, SessionState::Idle) {
            return Err(EditError::Busy);
        }
        let pos = self.snapper.snap(pos);
        let rotation = self.rotation;

        let p = match &self.tool {
            Tool::Road(road_type) => Provisional::Road {
                road_type: road_type.clone(),
                start: pos,
                end: pos,
            },
            Tool::Junction(kind) => Provisional::Junction {
                kind: *kind,
                pos,
                rotation,
            },
            Tool::TrafficLight => Provisional::TrafficLight { pos, rotation },
            Tool::SpawnSite(template) => Provisional::SpawnSite {
                template: template.clone(),
                pos,
                radius: 0.0,
            },
        };
        self.state = SessionState::Dragging(p);
        Ok(())
    }

    /// Cheap, may be called on every pointer sample
    pub fn update_drag(&mut self, pos: Vec3) -> Result<(), EditError> {
        let pos = self.snapper.snap(pos);
        let SessionState::Dragging(p) = &mut self.state else {
            return Err(EditError::NotDragging);
        };
        match p {
            Provisional::Road { end, .. } => *end = pos,
            Provisional::Junction { pos: at, .. } | Provisional::TrafficLight { pos: at, .. } => {
                *at = pos
            }
            Provisional::SpawnSite {
                pos: center,
                radius,
                ..
            } => *radius = center.horizontal_distance(pos),
        }
        Ok(())
    }

    pub fn rotate_cw(&mut self) {
        self.rotate(-FRAC_PI_2);
    }

    pub fn rotate_ccw(&mut self) {
        self.rotate(FRAC_PI_2);
    }

    fn rotate(&mut self, delta: f32) {
        self.rotation = (self.rotation + delta).rem_euclid(TAU);
        let rotation = self.rotation;
        if let SessionState::Dragging(
            Provisional::Junction { rotation: r, .. } | Provisional::TrafficLight { rotation: r, .. },
        ) = &mut self.state
        {
            *r = rotation;
        }
    }

    /// Drops the provisional element, returns whether there was one
    pub fn cancel(&mut self) -> bool {
        let was_dragging = matches!(self.state, SessionState::Dragging(_));
        self.state = SessionState::Idle;
        was_dragging
    }

    pub fn preview(&self, graph: &TopologyGraph) -> Preview {
        let max = graph.config.match_distance;
        match self.provisional() {
            Some(Provisional::Road { start, end, .. }) => {
                let mut junction_slots = graph.connected_junctions(*start, max);
                junction_slots.extend(graph.connected_junctions(*end, max));
                Preview {
                    roads: graph.connected_roads(*start, *end, None),
                    junction_slots,
                }
            }
            Some(Provisional::Junction { pos, .. }) => Preview {
                roads: graph.connected_roads(*pos, *pos, None),
                junction_slots: vec![],
            },
            _ => Preview::default(),
        }
    }

    /// Applies the provisional element to the graph. The session is idle afterwards,
    /// whether the commit succeeded or not.
    pub fn commit(&mut self, graph: &mut TopologyGraph) -> Result<CommitOutcome, EditError> {
        let p = match std::mem::replace(&mut self.state, SessionState::Committing) {
            SessionState::Dragging(p) => p,
            other => {
                self.state = other;
                return Err(EditError::NotDragging);
            }
        };
        let res = self.apply(p, graph);
        self.state = SessionState::Idle;
        res
    }

    fn apply(
        &mut self,
        p: Provisional,
        graph: &mut TopologyGraph,
    ) -> Result<CommitOutcome, EditError> {
        debug_assert_eq!(self.state, SessionState::Committing);
        Ok(match p {
            Provisional::Road {
                road_type,
                start,
                end,
            } => {
                if start.distance(end) < graph.config.min_road_length {
                    info!("discarded road shorter than {}", graph.config.min_road_length);
                    return Ok(CommitOutcome::Discarded);
                }
                self.counter += 1;
                let name = format!("{} {}", road_type.name, self.counter);
                let (id, report) = graph.add_road(&name, &road_type, vec![start, end])?;
                CommitOutcome::Road { id, report }
            }
            Provisional::Junction {
                kind,
                pos,
                rotation,
            } => {
                let (id, attached) = graph.add_junction(kind, pos, rotation)?;
                CommitOutcome::Junction { id, attached }
            }
            Provisional::TrafficLight { pos, rotation } => {
                CommitOutcome::TrafficLight(graph.create_traffic_light(pos, rotation))
            }
            Provisional::SpawnSite {
                template,
                pos,
                radius,
            } => CommitOutcome::SpawnSite(graph.create_spawn_site(pos, radius, &template)),
        })
    }
}
