use crate::map::LaneKey;
use geom::Vec3;
use serde::{Deserialize, Serialize};
use slotmapd::new_key_type;

new_key_type! {
    pub struct TrafficLightID;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightColor {
    Red,
    Yellow,
    Green,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightPhase {
    pub kind: LightColor,
    /// Seconds
    pub duration: f32,
}

/// Static description of a traffic light. Timing is left to the runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrafficLight {
    pub id: TrafficLightID,
    pub pos: Vec3,
    pub rotation: f32,
    pub yellow_stops_traffic: bool,
    pub phases: Vec<LightPhase>,

    /// Controlled movements, stored by stable lane keys so they survive lane regeneration
    pub movements: Vec<(LaneKey, LaneKey)>,
}

impl TrafficLight {
    pub fn new(id: TrafficLightID, pos: Vec3, rotation: f32) -> Self {
        Self {
            id,
            pos,
            rotation,
            yellow_stops_traffic: true,
            phases: vec![
                LightPhase {
                    kind: LightColor::Green,
                    duration: 10.0,
                },
                LightPhase {
                    kind: LightColor::Yellow,
                    duration: 3.0,
                },
                LightPhase {
                    kind: LightColor::Red,
                    duration: 13.0,
                },
            ],
            movements: vec![],
        }
    }

    pub fn controls(&self, from: LaneKey, to: LaneKey) -> bool {
        self.movements.contains(&(from, to))
    }

    pub fn cycle_duration(&self) -> f32 {
        self.phases.iter().map(|p| p.duration).sum()
    }
}
