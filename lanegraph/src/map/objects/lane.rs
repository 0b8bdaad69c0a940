use crate::map::{Connector, JunctionID, LaneData, RoadID, TopologyError, VehicleTypeMask};
use derive_more::From;
use geom::{PolyLine3, Vec3};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use slotmapd::{new_key_type, HopSlotMap};
use std::collections::BTreeMap;

new_key_type! {
    pub struct LaneID;
}

pub type Lanes = HopSlotMap<LaneID, Lane>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From)]
pub enum LaneOwner {
    Road(RoadID),
    Junction(JunctionID),
}

/// Stable identity of a lane across regenerations
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LaneKey {
    pub owner: LaneOwner,
    pub index: usize,
}

impl LaneKey {
    pub fn new(owner: impl Into<LaneOwner>, index: usize) -> Self {
        Self {
            owner: owner.into(),
            index,
        }
    }
}

/// A lane id tagged with the generation it was built in
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneRef {
    pub id: LaneID,
    pub generation: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneID,
    pub key: LaneKey,
    pub generation: u32,

    /// Always in the direction of travel
    pub points: PolyLine3,
    pub width: f32,
    pub vehicle_types: VehicleTypeMask,
    /// Travels against its owner's start -> end direction
    pub reversed: bool,

    /// Outgoing connectors, all starting at the last point
    pub connectors: Vec<Connector>,
}

impl Lane {
    pub fn lane_ref(&self) -> LaneRef {
        LaneRef {
            id: self.id,
            generation: self.generation,
        }
    }

    #[inline]
    pub fn last_index(&self) -> usize {
        self.points.n_points() - 1
    }
}

/// Registry of every lane of the graph.
/// Lanes are never mutated in place: they are discarded and registered again,
/// getting a fresh generation each time.
#[derive(Clone, Default)]
pub struct LaneStore {
    lanes: Lanes,
    by_key: BTreeMap<LaneKey, LaneID>,
    next_generation: u32,
}

impl LaneStore {
    pub fn get(&self, id: LaneID) -> Option<&Lane> {
        self.lanes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: LaneID) -> Option<&mut Lane> {
        self.lanes.get_mut(id)
    }

    pub fn by_key(&self, key: LaneKey) -> Option<&Lane> {
        self.lanes.get(*self.by_key.get(&key)?)
    }

    pub fn id_of(&self, key: LaneKey) -> Option<LaneID> {
        self.by_key.get(&key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = (&LaneKey, &LaneID)> {
        self.by_key.iter()
    }

    /// Lanes of an owner, ordered by index
    pub fn of_owner(&self, owner: LaneOwner) -> impl Iterator<Item = &Lane> + '_ {
        self.by_key
            .range(LaneKey::new(owner, 0)..=LaneKey::new(owner, usize::MAX))
            .filter_map(move |(_, id)| self.lanes.get(*id))
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.lanes.values().flat_map(|l| l.connectors.iter())
    }

    pub fn n_connectors(&self) -> usize {
        self.lanes.values().map(|l| l.connectors.len()).sum()
    }

    /// True when the reference points to the lane's current generation
    pub fn is_current(&self, r: LaneRef) -> bool {
        self.lanes
            .get(r.id)
            .map_or(false, |l| l.generation == r.generation)
    }

    pub fn register(&mut self, data: LaneData) -> Result<LaneRef, TopologyError> {
        if self.by_key.contains_key(&data.key) {
            return Err(TopologyError::DuplicateLane(data.key));
        }
        if data.points.n_points() < 2 || !data.points.iter().all(|p| p.is_finite()) {
            return Err(TopologyError::DegenerateLane(data.key));
        }

        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);

        let id = self.lanes.insert_with_key(|id| Lane {
            id,
            key: data.key,
            generation,
            points: data.points,
            width: data.width,
            vehicle_types: data.vehicle_types,
            reversed: data.reversed,
            connectors: vec![],
        });
        self.by_key.insert(data.key, id);

        Ok(LaneRef { id, generation })
    }

    /// Removes the lane and every connector pointing to it
    pub fn discard(&mut self, key: LaneKey) -> Option<Lane> {
        let id = self.by_key.remove(&key)?;
        let lane = self.lanes.remove(id)?;
        for other in self.lanes.values_mut() {
            other.connectors.retain(|c| c.to.id != id);
        }
        Some(lane)
    }

    pub fn remove_owner(&mut self, owner: LaneOwner) -> usize {
        let keys: Vec<LaneKey> = self
            .by_key
            .range(LaneKey::new(owner, 0)..=LaneKey::new(owner, usize::MAX))
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter()
            .filter(|k| self.discard(*k).is_some())
            .count()
    }

    pub fn clear(&mut self) {
        self.lanes.clear();
        self.by_key.clear();
    }

    pub fn clear_connectors(&mut self) {
        for l in self.lanes.values_mut() {
            l.connectors.clear();
        }
    }

    /// Lane whose last point is strictly the nearest to p, if within max_dist
    pub fn nearest_last_point(&self, p: Vec3, max_dist: f32) -> Option<LaneRef> {
        self.nearest_by(p, max_dist, |l| l.points.last())
    }

    /// Lane whose first point is strictly the nearest to p, if within max_dist
    pub fn nearest_first_point(&self, p: Vec3, max_dist: f32) -> Option<LaneRef> {
        self.nearest_by(p, max_dist, |l| l.points.first())
    }

    fn nearest_by(&self, p: Vec3, max_dist: f32, f: impl Fn(&Lane) -> Vec3) -> Option<LaneRef> {
        let max2 = max_dist * max_dist;
        self.lanes
            .values()
            .map(|l| (l, f(l).distance2(p)))
            .filter(|&(_, d)| d <= max2)
            .min_by_key(|&(_, d)| OrderedFloat(d))
            .map(|(l, _)| l.lane_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::{LaneKey, LaneStore};
    use crate::map::{LaneData, RoadID, TopologyError, VehicleTypeMask};
    use geom::{vec3, PolyLine3};

    fn data(key: LaneKey) -> LaneData {
        LaneData {
            key,
            points: PolyLine3::new(vec![vec3(0.0, 0.0, 0.0), vec3(10.0, 0.0, 0.0)]),
            width: 3.0,
            vehicle_types: VehicleTypeMask::VEHICLES,
            reversed: false,
        }
    }

    #[test]
    fn duplicate_key_is_refused() {
        let mut store = LaneStore::default();
        let key = LaneKey::new(RoadID::default(), 0);

        let first = store.register(data(key)).unwrap();
        assert_eq!(
            store.register(data(key)),
            Err(TopologyError::DuplicateLane(key))
        );
        assert_eq!(store.len(), 1);
        assert!(store.is_current(first));
    }

    #[test]
    fn generations_advance() {
        let mut store = LaneStore::default();
        let key = LaneKey::new(RoadID::default(), 0);

        let old = store.register(data(key)).unwrap();
        assert!(store.discard(key).is_some());
        let new = store.register(data(key)).unwrap();

        assert_ne!(old.generation, new.generation);
        assert!(!store.is_current(old));
        assert!(store.is_current(new));
    }
}
