use crate::map::{LanePath, RoadEnd, RoadID, RoadKind};
use common::FastMap;
use geom::{Vec2, Vec3};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use slotmapd::new_key_type;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

new_key_type! {
    pub struct JunctionID;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JunctionKind {
    /// Four way crossing
    CrossingX,
    /// Three way crossing
    CrossingT,
    /// Zero radius joint created when two road ends meet or a road is split
    Flex,
}

impl JunctionKind {
    /// Slot names and their angle relative to the junction's rotation
    pub fn slots(self) -> &'static [(&'static str, f32)] {
        match self {
            JunctionKind::CrossingX => &[
                ("east", 0.0),
                ("north", FRAC_PI_2),
                ("west", PI),
                ("south", 3.0 * FRAC_PI_2),
            ],
            JunctionKind::CrossingT => &[("east", 0.0), ("north", FRAC_PI_2), ("west", PI)],
            JunctionKind::Flex => &[("a", 0.0), ("b", TAU / 3.0), ("c", 2.0 * TAU / 3.0)],
        }
    }

    pub fn is_crossing(self) -> bool {
        matches!(self, JunctionKind::CrossingX | JunctionKind::CrossingT)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub angle: f32,
    pub road: Option<(RoadID, RoadEnd)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Junction {
    pub id: JunctionID,
    pub kind: JunctionKind,
    /// Kind of roads this junction accepts
    pub road_kind: RoadKind,
    pub pos: Vec3,
    pub rotation: f32,
    pub radius: f32,
    pub corner_radius: f32,
    pub crosswalks: bool,
    /// Set once a third road gets attached
    pub branching: bool,
    pub slots: Vec<Slot>,

    /// Connector paths per (slot, lane), reset whenever the slots change
    #[serde(skip)]
    pub(crate) path_cache: FastMap<(usize, usize), Vec<LanePath>>,
}

impl Junction {
    pub fn new(
        id: JunctionID,
        kind: JunctionKind,
        road_kind: RoadKind,
        pos: Vec3,
        rotation: f32,
        radius: f32,
        corner_radius: f32,
        crosswalks: bool,
    ) -> Self {
        Self {
            id,
            kind,
            road_kind,
            pos,
            rotation,
            radius,
            corner_radius,
            crosswalks,
            branching: false,
            slots: kind
                .slots()
                .iter()
                .map(|&(name, angle)| Slot {
                    name: name.to_string(),
                    angle,
                    road: None,
                })
                .collect(),
            path_cache: Default::default(),
        }
    }

    /// Horizontal direction pointing out of the junction through the slot
    pub fn slot_dir(&self, slot: usize) -> Vec2 {
        let angle = self.slots.get(slot).map(|s| s.angle).unwrap_or(0.0);
        Vec2::from_angle(self.rotation + angle)
    }

    /// Point where a road attached to the slot must end
    pub fn slot_mouth(&self, slot: usize) -> Vec3 {
        self.pos + (self.slot_dir(slot) * self.radius).z0()
    }

    pub fn attached(&self) -> impl Iterator<Item = (usize, RoadID, RoadEnd)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.road.map(|(r, e)| (i, r, e)))
    }

    pub fn n_attached(&self) -> usize {
        self.slots.iter().filter(|s| s.road.is_some()).count()
    }

    pub fn free_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.road.is_none())
            .map(|(i, _)| i)
    }

    pub fn has_free_slot(&self) -> bool {
        self.free_slots().next().is_some()
    }

    /// Free slot whose mouth is the closest to pos
    pub fn nearest_free_slot(&self, pos: Vec3) -> Option<usize> {
        self.free_slots()
            .min_by_key(|&s| OrderedFloat(self.slot_mouth(s).distance2(pos)))
    }

    pub fn slot_of(&self, road: RoadID, end: RoadEnd) -> Option<usize> {
        self.slots.iter().position(|s| s.road == Some((road, end)))
    }

    pub fn holds_road(&self, road: RoadID) -> bool {
        self.slots
            .iter()
            .any(|s| matches!(s.road, Some((r, _)) if r == road))
    }

    /// Distance used when matching a position against this junction:
    /// the closest of its center and its free slot mouths
    pub fn match_distance(&self, pos: Vec3) -> f32 {
        self.free_slots()
            .map(|s| self.slot_mouth(s).distance(pos))
            .fold(self.pos.distance(pos), f32::min)
    }

    pub fn accepts(&self, kind: RoadKind) -> bool {
        self.road_kind == kind
    }

    /// Recompute derived state after a slot change and drop cached connector paths
    pub fn refresh(&mut self) {
        if self.n_attached() >= 3 {
            self.branching = true;
        }
        self.path_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{Junction, JunctionKind};
    use crate::map::{RoadKind, Junctions};
    use geom::vec3;

    #[test]
    fn slot_mouths() {
        let mut store = Junctions::default();
        let id = store.insert_with_key(|id| {
            Junction::new(
                id,
                JunctionKind::CrossingX,
                RoadKind::Road,
                vec3(10.0, 0.0, 1.0),
                std::f32::consts::FRAC_PI_2,
                6.0,
                4.0,
                true,
            )
        });
        let j = &store[id];
        assert_eq!(j.slots.len(), 4);
        // rotated by 90°, east slot points north
        assert!(j.slot_mouth(0).distance(vec3(10.0, 6.0, 1.0)) < 1e-4);
        assert!(j.slot_mouth(1).distance(vec3(4.0, 0.0, 1.0)) < 1e-4);
        assert_eq!(j.nearest_free_slot(vec3(10.0, -7.0, 1.0)), Some(2));
        assert!((j.match_distance(vec3(10.0, 7.0, 1.0)) - 1.0).abs() < 1e-4);
    }
}
