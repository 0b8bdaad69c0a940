use crate::map::{
    ConnectorWirer, GeometryProvider, Junction, JunctionID, JunctionKind, Junctions, LaneData,
    LaneKey, LaneOwner, LaneStore, LaneSynthesizer, LightPhase, Road, RoadEnd, RoadID, RoadKind,
    RoadType, Roads, SlotRef, SpatialMatch, SpatialMatcher, SpawnSite, SpawnSiteID, SpawnSites,
    SpawnTemplate, SplineGeometry, TopologyError, TrafficLight, TrafficLightID, TrafficLights,
    VehicleTypeMask,
};
use crate::spawn::SpawnChoice;
use crate::utils::config::Config;
use crate::utils::rand_provider::RandProvider;
use common::error::MultiError;
use common::FastMap;
use geom::{PolyLine3, Vec3};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of splitting a road at one of its centerline points
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SplitOutcome {
    pub before: RoadID,
    pub after: RoadID,
    pub junction: JunctionID,
}

/// What happened to each end of a committed road
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InsertReport {
    pub junctions: Vec<JunctionID>,
    pub joined: Vec<(RoadID, RoadEnd)>,
    pub splits: Vec<SplitOutcome>,
    pub free_ends: Vec<RoadEnd>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConnectedRoad {
    pub road: RoadID,
    pub marker_index: usize,
    /// Which of the queried positions matched
    pub end: RoadEnd,
}

/// Lane content without ids or generations, comparable across rebuilds
#[derive(Clone, Debug, PartialEq)]
pub struct LaneSnapshot {
    pub key: LaneKey,
    pub points: Vec<Vec3>,
    pub width: f32,
    pub vehicle_types: VehicleTypeMask,
    pub connectors: Vec<(LaneKey, Vec<Vec3>)>,
}

/// Owns every road, junction, lane and connector.
/// All edits go through it and leave it either fully rebuilt or untouched.
#[derive(Clone)]
pub struct TopologyGraph {
    roads: Roads,
    junctions: Junctions,
    lanes: LaneStore,
    spawn_sites: SpawnSites,
    traffic_lights: TrafficLights,
    geometry: Arc<dyn GeometryProvider>,
    pub config: Config,
}

impl TopologyGraph {
    pub fn new(config: Config) -> Self {
        let geometry = Arc::new(SplineGeometry::new(&config));
        Self::with_geometry(config, geometry)
    }

    pub fn with_geometry(config: Config, geometry: Arc<dyn GeometryProvider>) -> Self {
        Self {
            roads: Roads::default(),
            junctions: Junctions::default(),
            lanes: LaneStore::default(),
            spawn_sites: SpawnSites::default(),
            traffic_lights: TrafficLights::default(),
            geometry,
            config,
        }
    }

    pub fn roads(&self) -> &Roads {
        &self.roads
    }

    pub fn junctions(&self) -> &Junctions {
        &self.junctions
    }

    pub fn lanes(&self) -> &LaneStore {
        &self.lanes
    }

    pub fn spawn_sites(&self) -> &SpawnSites {
        &self.spawn_sites
    }

    pub fn traffic_lights(&self) -> &TrafficLights {
        &self.traffic_lights
    }

    pub fn geometry(&self) -> &dyn GeometryProvider {
        &*self.geometry
    }

    pub fn matcher(&self) -> SpatialMatcher<'_> {
        SpatialMatcher::new(
            &self.roads,
            &self.junctions,
            self.config.junction_match,
            self.config.match_distance,
        )
    }

    /// Runs f on the graph, restoring the previous state if it fails
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TopologyError>,
    ) -> Result<T, TopologyError> {
        let snapshot = self.clone();
        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                log::error!("edit failed, graph restored: {}", e);
                *self = snapshot;
                Err(e)
            }
        }
    }

    /// Creates an unattached road with its lanes
    pub fn create_road(
        &mut self,
        name: &str,
        rtype: &RoadType,
        markers: Vec<Vec3>,
    ) -> Result<RoadID, TopologyError> {
        self.transaction(|g| g.create_road_inner(name, rtype, markers))
    }

    fn create_road_inner(
        &mut self,
        name: &str,
        rtype: &RoadType,
        markers: Vec<Vec3>,
    ) -> Result<RoadID, TopologyError> {
        if markers.len() < 2 {
            return Err(TopologyError::InvalidRoad("a road needs at least two markers"));
        }
        if rtype.n_lanes() == 0 {
            return Err(TopologyError::InvalidRoad("a road needs at least one lane"));
        }
        let points = self
            .geometry
            .road_centerline(&markers)
            .ok_or(TopologyError::InvalidRoad("markers produce no centerline"))?;
        if points.length() <= 0.0 {
            return Err(TopologyError::InvalidRoad("road has zero length"));
        }

        let id = self
            .roads
            .insert_with_key(|id| Road::new(id, name.to_string(), rtype, markers, points));
        self.rebuild_owners(vec![LaneOwner::Road(id)])?;

        info!("created road {:?} ({})", id, rtype.name);
        Ok(id)
    }

    /// Creates the road then resolves its topology
    pub fn add_road(
        &mut self,
        name: &str,
        rtype: &RoadType,
        markers: Vec<Vec3>,
    ) -> Result<(RoadID, InsertReport), TopologyError> {
        self.transaction(|g| {
            let id = g.create_road_inner(name, rtype, markers)?;
            let report = g.insert_road_inner(id)?;
            Ok((id, report))
        })
    }

    /// Attaches the free ends of a road to whatever they fall on, then rebuilds
    /// the lanes of everything touched and every connector.
    pub fn insert_road(&mut self, id: RoadID) -> Result<InsertReport, TopologyError> {
        self.transaction(|g| g.insert_road_inner(id))
    }

    fn insert_road_inner(&mut self, id: RoadID) -> Result<InsertReport, TopologyError> {
        profiling::scope!("graph::insert_road");
        let kind = self.roads.get(id).ok_or(TopologyError::UnknownRoad(id))?.kind;

        let mut report = InsertReport::default();
        let mut touched_roads = BTreeSet::from([id]);
        let mut touched_junctions = BTreeSet::new();
        let mut pending: Vec<(RoadEnd, (RoadID, RoadEnd))> = vec![];
        let mut renames: FastMap<(RoadID, RoadEnd), (RoadID, RoadEnd)> = FastMap::default();
        // both ends of a short road can fall on the same target; only the first one takes it
        let mut claimed: BTreeSet<JunctionID> = BTreeSet::new();

        for end in RoadEnd::BOTH {
            let road = self.roads.get(id).ok_or(TopologyError::UnknownRoad(id))?;
            if !road.is_free(end) {
                if let Some(att) = road.attachment(end) {
                    claimed.insert(att.junction);
                }
                continue;
            }
            let pos = road.end_marker(end);

            let m = self.matcher().classify(pos, kind, Some(id));
            let taken = match m {
                SpatialMatch::Junction(j) => claimed.contains(&j),
                SpatialMatch::RoadEndpoint(other, other_end) => pending
                    .iter()
                    .any(|&(_, target)| target == (other, other_end)),
                _ => false,
            };
            if taken {
                info!(
                    "{:?} end of road {:?} falls on a target its other end already took",
                    end, id
                );
                report.free_ends.push(end);
                continue;
            }

            match m {
                SpatialMatch::Junction(j) => {
                    if self.attach(id, end, j)?.is_some() {
                        claimed.insert(j);
                        touched_junctions.insert(j);
                        report.junctions.push(j);
                    } else {
                        report.free_ends.push(end);
                    }
                }
                SpatialMatch::RoadEndpoint(other, other_end) => {
                    pending.push((end, (other, other_end)));
                }
                SpatialMatch::RoadMidSpan(other, idx) => {
                    let split = self.split_inner(other, idx)?;
                    renames.insert((other, RoadEnd::Start), (split.before, RoadEnd::Start));
                    renames.insert((other, RoadEnd::End), (split.after, RoadEnd::End));
                    touched_roads.extend([split.before, split.after]);
                    touched_junctions.insert(split.junction);
                    claimed.insert(split.junction);
                    report.splits.push(split);

                    if self.attach(id, end, split.junction)?.is_none() {
                        report.free_ends.push(end);
                    }
                }
                SpatialMatch::Free => {
                    info!("{:?} end of road {:?} is free standing", end, id);
                    report.free_ends.push(end);
                }
            }
        }

        for (end, mut target) in pending {
            while let Some(&renamed) = renames.get(&target) {
                target = renamed;
            }
            match self.connect_road_ends(id, end, target.0, target.1)? {
                Some(j) => {
                    touched_roads.insert(target.0);
                    touched_junctions.insert(j);
                    report.joined.push(target);
                }
                None => report.free_ends.push(end),
            }
        }

        self.finish_edit(touched_roads, touched_junctions)?;

        info!(
            "inserted road {:?}: {} junctions, {} joins, {} splits, {} free ends",
            id,
            report.junctions.len(),
            report.joined.len(),
            report.splits.len(),
            report.free_ends.len()
        );
        Ok(report)
    }

    /// Creates an empty junction. Crossings only accept roads, not footpaths.
    pub fn create_junction(&mut self, kind: JunctionKind, pos: Vec3, rotation: f32) -> JunctionID {
        let radius = if kind.is_crossing() {
            self.config.crossing_radius
        } else {
            0.0
        };
        let corner_radius = self.config.corner_radius;
        let crosswalks = self.config.crosswalks;
        let id = self.junctions.insert_with_key(|id| {
            Junction::new(
                id,
                kind,
                RoadKind::Road,
                pos,
                rotation,
                radius,
                corner_radius,
                crosswalks,
            )
        });
        info!("created junction {:?} ({:?})", id, kind);
        id
    }

    fn new_flex(&mut self, pos: Vec3, road_kind: RoadKind) -> JunctionID {
        let corner_radius = self.config.corner_radius;
        self.junctions.insert_with_key(|id| {
            Junction::new(
                id,
                JunctionKind::Flex,
                road_kind,
                pos,
                0.0,
                0.0,
                corner_radius,
                false,
            )
        })
    }

    pub fn add_junction(
        &mut self,
        kind: JunctionKind,
        pos: Vec3,
        rotation: f32,
    ) -> Result<(JunctionID, Vec<(RoadID, RoadEnd)>), TopologyError> {
        self.transaction(|g| {
            let id = g.create_junction(kind, pos, rotation);
            let attached = g.insert_junction_inner(id)?;
            Ok((id, attached))
        })
    }

    /// Attaches every free road end lying close to a free slot mouth, closest pairs first
    pub fn insert_junction(
        &mut self,
        id: JunctionID,
    ) -> Result<Vec<(RoadID, RoadEnd)>, TopologyError> {
        self.transaction(|g| g.insert_junction_inner(id))
    }

    fn insert_junction_inner(
        &mut self,
        id: JunctionID,
    ) -> Result<Vec<(RoadID, RoadEnd)>, TopologyError> {
        let junction = self
            .junctions
            .get(id)
            .ok_or(TopologyError::UnknownJunction(id))?;
        let max = self.config.match_distance;

        let mut candidates: Vec<(f32, RoadID, RoadEnd, usize)> = vec![];
        for road in self.roads.values() {
            if !junction.accepts(road.kind) {
                continue;
            }
            for end in RoadEnd::BOTH {
                if !road.is_free(end) {
                    continue;
                }
                let pos = road.end_marker(end);
                for slot in junction.free_slots() {
                    let d = junction.slot_mouth(slot).distance(pos);
                    if d <= max {
                        candidates.push((d, road.id, end, slot));
                    }
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut attached = vec![];
        let mut touched_roads = BTreeSet::new();
        for (_, road, end, slot) in candidates {
            if attached.contains(&(road, end)) {
                continue;
            }
            if self.attach_to_slot(road, end, id, slot)? {
                attached.push((road, end));
                touched_roads.insert(road);
            }
        }

        self.finish_edit(touched_roads, BTreeSet::from([id]))?;
        info!("inserted junction {:?} with {} roads", id, attached.len());
        Ok(attached)
    }

    /// Plugs a road end into the junction's free slot closest to it.
    /// Returns the slot, or None if the junction refused the road.
    pub(crate) fn attach(
        &mut self,
        road: RoadID,
        end: RoadEnd,
        junction: JunctionID,
    ) -> Result<Option<usize>, TopologyError> {
        let pos = self
            .roads
            .get(road)
            .ok_or(TopologyError::UnknownRoad(road))?
            .end_marker(end);
        let j = self
            .junctions
            .get(junction)
            .ok_or(TopologyError::UnknownJunction(junction))?;
        let Some(slot) = j.nearest_free_slot(pos) else {
            warn!("junction {:?} has no free slot for road {:?}", junction, road);
            return Ok(None);
        };
        Ok(self
            .attach_to_slot(road, end, junction, slot)?
            .then_some(slot))
    }

    /// Moves the road end onto the slot mouth and records the attachment on both sides
    fn attach_to_slot(
        &mut self,
        road_id: RoadID,
        end: RoadEnd,
        junction_id: JunctionID,
        slot: usize,
    ) -> Result<bool, TopologyError> {
        let road = self
            .roads
            .get_mut(road_id)
            .ok_or(TopologyError::UnknownRoad(road_id))?;
        let junction = self
            .junctions
            .get_mut(junction_id)
            .ok_or(TopologyError::UnknownJunction(junction_id))?;

        if !junction.accepts(road.kind) {
            warn!(
                "junction {:?} refuses {:?} road {:?}",
                junction_id,
                road.kind,
                road_id
            );
            return Ok(false);
        }
        if !road.is_free(end) {
            warn!("{:?} end of road {:?} is already attached", end, road_id);
            return Ok(false);
        }
        let Some(s) = junction.slots.get_mut(slot) else {
            warn!("junction {:?} has no slot {}", junction_id, slot);
            return Ok(false);
        };
        if s.road.is_some() {
            warn!("slot {} of junction {:?} is taken", slot, junction_id);
            return Ok(false);
        }

        s.road = Some((road_id, end));
        junction.refresh();
        let mouth = junction.slot_mouth(slot);

        road.set_attachment(
            end,
            Some(SlotRef {
                junction: junction_id,
                slot,
            }),
        );
        if road.end_marker(end) != mouth {
            road.set_end_marker(end, mouth);
            self.recompute_centerline(road_id)?;
        }
        Ok(true)
    }

    fn recompute_centerline(&mut self, id: RoadID) -> Result<(), TopologyError> {
        let road = self
            .roads
            .get_mut(id)
            .ok_or(TopologyError::UnknownRoad(id))?;
        road.points = self
            .geometry
            .road_centerline(&road.markers)
            .ok_or(TopologyError::InvalidRoad("markers produce no centerline"))?;
        Ok(())
    }

    /// Joins two road ends through a flex junction, reusing the one already
    /// at `other_end` when it has room
    fn connect_road_ends(
        &mut self,
        road: RoadID,
        end: RoadEnd,
        other: RoadID,
        other_end: RoadEnd,
    ) -> Result<Option<JunctionID>, TopologyError> {
        let o = self
            .roads
            .get(other)
            .ok_or(TopologyError::UnknownRoad(other))?;

        if let Some(att) = o.attachment(other_end) {
            return Ok(self
                .attach(road, end, att.junction)?
                .map(|_| att.junction));
        }

        let (pos, kind) = (o.end_marker(other_end), o.kind);
        let j = self.new_flex(pos, kind);
        if !self.attach_to_slot(other, other_end, j, 0)? || !self.attach_to_slot(road, end, j, 1)? {
            log::error!("couldn't join {:?} and {:?} through {:?}", road, other, j);
            return Err(TopologyError::BrokenAttachment { road, junction: j });
        }
        info!("joined {:?} {:?} to {:?} {:?}", road, end, other, other_end);
        Ok(Some(j))
    }

    /// Splits a road at an interior centerline point, joining the two stubs
    /// with a new flex junction
    pub fn split_road(&mut self, id: RoadID, idx: usize) -> Result<SplitOutcome, TopologyError> {
        self.transaction(|g| {
            let split = g.split_inner(id, idx)?;
            g.finish_edit(
                BTreeSet::from([split.before, split.after]),
                BTreeSet::from([split.junction]),
            )?;
            Ok(split)
        })
    }

    fn split_inner(&mut self, id: RoadID, idx: usize) -> Result<SplitOutcome, TopologyError> {
        let road = self
            .roads
            .get(id)
            .ok_or(TopologyError::UnknownRoad(id))?
            .clone();
        let (first, second) = self
            .geometry
            .split_road_at(&road, idx)
            .ok_or(TopologyError::InvalidRoad("split point must be interior"))?;
        let pos = road.points[idx];

        self.lanes.remove_owner(LaneOwner::Road(id));
        self.roads.remove(id);

        let junction = self.new_flex(pos, road.kind);
        let before = self.insert_stub(&road, first);
        let after = self.insert_stub(&road, second);

        // the old road's ends now belong to the stubs
        for (end, stub) in [(RoadEnd::Start, before), (RoadEnd::End, after)] {
            let att = unwrap_cont!(road.attachment(end));
            if let Some(slot) = self
                .junctions
                .get_mut(att.junction)
                .and_then(|j| j.slots.get_mut(att.slot))
            {
                slot.road = Some((stub, end));
            }
            if let Some(j) = self.junctions.get_mut(att.junction) {
                j.refresh();
            }
            if let Some(r) = self.roads.get_mut(stub) {
                r.set_attachment(end, Some(att));
            }
        }

        if !self.attach_to_slot(before, RoadEnd::End, junction, 0)?
            || !self.attach_to_slot(after, RoadEnd::Start, junction, 1)?
        {
            return Err(TopologyError::BrokenAttachment { road: id, junction });
        }

        self.remap_movements(id, before, after);

        info!(
            "split road {:?} at point {} into {:?} and {:?}",
            id,
            idx,
            before,
            after
        );
        Ok(SplitOutcome {
            before,
            after,
            junction,
        })
    }

    fn insert_stub(&mut self, road: &Road, points: PolyLine3) -> RoadID {
        let markers = points.as_slice().to_vec();
        self.roads
            .insert_with_key(|id| road.stub(id, markers, points))
    }

    /// Traffic light movements on a split road follow the stub on the same side
    fn remap_movements(&mut self, old: RoadID, before: RoadID, after: RoadID) {
        let Some(stub) = self.roads.get(before) else {
            return;
        };
        let forward = stub.lanes_forward as usize;
        // forward lanes arrive at the end and leave from the start, backward lanes do the opposite
        let remap = |key: LaneKey, arriving: bool| -> LaneKey {
            if key.owner != LaneOwner::Road(old) {
                return key;
            }
            let is_forward = key.index < forward;
            let owner = if is_forward == arriving { after } else { before };
            LaneKey::new(owner, key.index)
        };
        for light in self.traffic_lights.values_mut() {
            for (from, to) in light.movements.iter_mut() {
                *from = remap(*from, true);
                *to = remap(*to, false);
            }
        }
    }

    /// Refreshes the junctions around the touched roads, regenerates their lanes
    /// and every connector, then checks the invariants
    fn finish_edit(
        &mut self,
        roads: BTreeSet<RoadID>,
        mut junctions: BTreeSet<JunctionID>,
    ) -> Result<(), TopologyError> {
        let roads: Vec<RoadID> = roads
            .into_iter()
            .filter(|r| self.roads.contains_key(*r))
            .collect();
        for r in &roads {
            if let Some(road) = self.roads.get(*r) {
                junctions.extend(road.junctions());
            }
        }
        junctions.retain(|j| self.junctions.contains_key(*j));
        for j in &junctions {
            if let Some(j) = self.junctions.get_mut(*j) {
                j.refresh();
            }
        }

        let owners = roads
            .into_iter()
            .map(LaneOwner::from)
            .chain(junctions.into_iter().map(LaneOwner::from))
            .collect();
        self.rebuild_owners(owners)?;
        self.rebuild_connectors();
        self.check_invariants()
    }

    /// Discards then synthesizes again the lanes of the owners
    fn rebuild_owners(&mut self, owners: Vec<LaneOwner>) -> Result<(), TopologyError> {
        profiling::scope!("graph::rebuild_owners");
        for owner in &owners {
            self.lanes.remove_owner(*owner);
        }

        let synth = LaneSynthesizer::new(&*self.geometry, self.config.decimation_tolerance);
        let roads = &self.roads;
        let junctions = &self.junctions;
        let built: Vec<Vec<LaneData>> = owners
            .par_iter()
            .map(|&owner| synth.owner_lanes(owner, roads, junctions))
            .collect::<Result<_, _>>()?;

        for data in built.into_iter().flatten() {
            self.lanes.register(data)?;
        }
        Ok(())
    }

    /// Connectors are always rebuilt from scratch
    pub fn rebuild_connectors(&mut self) -> usize {
        let wirer = ConnectorWirer::new(&*self.geometry, self.config.connector_distance);
        let n = wirer.wire(&self.roads, &mut self.junctions, &mut self.lanes);

        let lanes = &self.lanes;
        for light in self.traffic_lights.values_mut() {
            let before = light.movements.len();
            light
                .movements
                .retain(|&(from, to)| has_connector(lanes, from, to));
            if light.movements.len() != before {
                info!(
                    "pruned {} movements of traffic light {:?}",
                    before - light.movements.len(),
                    light.id
                );
            }
        }
        n
    }

    /// Regenerates every lane and connector from the roads and junctions
    pub fn rebuild_all(&mut self) -> Result<(), TopologyError> {
        self.transaction(|g| {
            g.lanes.clear();
            for j in g.junctions.values_mut() {
                j.refresh();
            }
            let owners = g
                .roads
                .keys()
                .map(LaneOwner::from)
                .chain(g.junctions.keys().map(LaneOwner::from))
                .collect();
            g.rebuild_owners(owners)?;
            g.rebuild_connectors();
            g.check_invariants()
        })
    }

    /// Walks every entity and reports every broken invariant at once
    pub fn check_invariants(&self) -> Result<(), TopologyError> {
        let mut errors = MultiError::new();

        for lane in self.lanes.iter() {
            log::debug!("{:?} {:?}", lane.id, lane.key);
            if lane.points.n_points() < 2 || !lane.points.iter().all(|p| p.is_finite()) {
                errors.push(TopologyError::DegenerateLane(lane.key));
            }
            if self.lanes.id_of(lane.key) != Some(lane.id) {
                errors.push(TopologyError::DuplicateLane(lane.key));
            }

            for c in &lane.connectors {
                if c.from != lane.lane_ref()
                    || !self.lanes.is_current(c.from)
                    || !self.lanes.is_current(c.to)
                {
                    errors.push(TopologyError::StaleConnector {
                        from: c.from,
                        to: c.to,
                    });
                    continue;
                }
                if c.from_point != lane.last_index() {
                    errors.push(TopologyError::BadConnectorPoint {
                        lane: lane.id,
                        point: c.from_point,
                    });
                }
                if c.to_point != 0 {
                    errors.push(TopologyError::BadConnectorPoint {
                        lane: c.to.id,
                        point: c.to_point,
                    });
                }
            }
        }

        for road in self.roads.values() {
            log::debug!("{:?}", road.id);
            for lane in 0..road.n_lanes() {
                let key = LaneKey::new(road.id, lane);
                if self.lanes.id_of(key).is_none() {
                    errors.push(TopologyError::MissingLane(key));
                }
            }
            for end in RoadEnd::BOTH {
                let att = unwrap_cont!(road.attachment(end));
                let consistent = self
                    .junctions
                    .get(att.junction)
                    .and_then(|j| j.slots.get(att.slot))
                    .map_or(false, |s| s.road == Some((road.id, end)));
                if !consistent {
                    errors.push(TopologyError::BrokenAttachment {
                        road: road.id,
                        junction: att.junction,
                    });
                }
            }
        }

        for junction in self.junctions.values() {
            log::debug!("{:?}", junction.id);
            for (slot, road, end) in junction.attached() {
                let consistent = self.roads.get(road).and_then(|r| r.attachment(end))
                    == Some(SlotRef {
                        junction: junction.id,
                        slot,
                    });
                if !consistent {
                    errors.push(TopologyError::BrokenAttachment {
                        road,
                        junction: junction.id,
                    });
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        for e in errors.iter() {
            log::error!("invariant violated: {}", e);
        }
        Err(TopologyError::Invariants(errors))
    }

    /// Roads having a marker exactly at one of the positions
    pub fn connected_roads(
        &self,
        start: Vec3,
        end: Vec3,
        excluding: Option<RoadID>,
    ) -> Vec<ConnectedRoad> {
        let mut out = vec![];
        for road in self.roads.values() {
            if Some(road.id) == excluding {
                continue;
            }
            for (marker_index, &m) in road.markers.iter().enumerate() {
                for (which, pos) in [(RoadEnd::Start, start), (RoadEnd::End, end)] {
                    if m == pos {
                        out.push(ConnectedRoad {
                            road: road.id,
                            marker_index,
                            end: which,
                        });
                    }
                }
            }
        }
        out
    }

    /// Junction slots whose mouth is within max of pos
    pub fn connected_junctions(&self, pos: Vec3, max: f32) -> Vec<(JunctionID, usize)> {
        self.junctions
            .values()
            .flat_map(|j| {
                (0..j.slots.len())
                    .filter(move |&s| j.slot_mouth(s).distance(pos) <= max)
                    .map(move |s| (j.id, s))
            })
            .collect()
    }

    pub fn lane_snapshot(&self) -> Vec<LaneSnapshot> {
        self.lanes
            .keys()
            .filter_map(|(key, id)| {
                let lane = self.lanes.get(*id)?;
                let mut connectors: Vec<(LaneKey, Vec<Vec3>)> = lane
                    .connectors
                    .iter()
                    .filter_map(|c| {
                        Some((self.lanes.get(c.to.id)?.key, c.points.as_slice().to_vec()))
                    })
                    .collect();
                connectors.sort_by_key(|(k, _)| *k);
                Some(LaneSnapshot {
                    key: *key,
                    points: lane.points.as_slice().to_vec(),
                    width: lane.width,
                    vehicle_types: lane.vehicle_types,
                    connectors,
                })
            })
            .collect()
    }

    pub fn create_traffic_light(&mut self, pos: Vec3, rotation: f32) -> TrafficLightID {
        let id = self
            .traffic_lights
            .insert_with_key(|id| TrafficLight::new(id, pos, rotation));
        info!("created traffic light {:?}", id);
        id
    }

    fn light_mut(&mut self, id: TrafficLightID) -> Result<&mut TrafficLight, TopologyError> {
        self.traffic_lights
            .get_mut(id)
            .ok_or(TopologyError::UnknownTrafficLight(id))
    }

    pub fn move_traffic_light(
        &mut self,
        id: TrafficLightID,
        pos: Vec3,
        rotation: f32,
    ) -> Result<(), TopologyError> {
        let light = self.light_mut(id)?;
        light.pos = pos;
        light.rotation = rotation;
        Ok(())
    }

    pub fn set_phases(
        &mut self,
        id: TrafficLightID,
        phases: Vec<LightPhase>,
    ) -> Result<(), TopologyError> {
        self.light_mut(id)?.phases = phases;
        Ok(())
    }

    /// Puts the movement from -> to under the light's control.
    /// Returns false if there is no such connector or it is already controlled.
    pub fn connect_lanes(
        &mut self,
        id: TrafficLightID,
        from: LaneKey,
        to: LaneKey,
    ) -> Result<bool, TopologyError> {
        if self.lanes.id_of(from).is_none() {
            return Err(TopologyError::MissingLane(from));
        }
        if self.lanes.id_of(to).is_none() {
            return Err(TopologyError::MissingLane(to));
        }
        let exists = has_connector(&self.lanes, from, to);
        let light = self.light_mut(id)?;
        if !exists || light.controls(from, to) {
            return Ok(false);
        }
        light.movements.push((from, to));
        Ok(true)
    }

    pub fn disconnect_lanes(
        &mut self,
        id: TrafficLightID,
        from: LaneKey,
        to: LaneKey,
    ) -> Result<bool, TopologyError> {
        let light = self.light_mut(id)?;
        let before = light.movements.len();
        light.movements.retain(|&m| m != (from, to));
        Ok(light.movements.len() != before)
    }

    pub fn controlled_lanes(
        &self,
        id: TrafficLightID,
    ) -> Result<&[(LaneKey, LaneKey)], TopologyError> {
        self.traffic_lights
            .get(id)
            .map(|l| l.movements.as_slice())
            .ok_or(TopologyError::UnknownTrafficLight(id))
    }

    pub fn create_spawn_site(
        &mut self,
        pos: Vec3,
        radius: f32,
        template: &SpawnTemplate,
    ) -> SpawnSiteID {
        let id = self
            .spawn_sites
            .insert_with_key(|id| SpawnSite::new(id, pos, radius, template));
        info!("created spawn site {:?}", id);
        id
    }

    pub fn spawn_site_mut(&mut self, id: SpawnSiteID) -> Result<&mut SpawnSite, TopologyError> {
        self.spawn_sites
            .get_mut(id)
            .ok_or(TopologyError::UnknownSpawnSite(id))
    }

    /// Advances every active site and draws a spawn for the ones that are due
    pub fn tick_spawners(
        &mut self,
        dt: f32,
        rng: &mut RandProvider,
    ) -> Vec<(SpawnSiteID, SpawnChoice)> {
        let mut out = vec![];
        for site in self.spawn_sites.values_mut() {
            if !site.tick(dt) {
                continue;
            }
            match crate::spawn::spawn(site, &self.lanes, rng) {
                Some(choice) => out.push((site.id, choice)),
                None => info!("no eligible spawn point for {:?}", site.id),
            }
        }
        out
    }
}

fn has_connector(lanes: &LaneStore, from: LaneKey, to: LaneKey) -> bool {
    let (Some(src), Some(dst)) = (lanes.by_key(from), lanes.id_of(to)) else {
        return false;
    };
    src.connectors.iter().any(|c| c.to.id == dst)
}

#[cfg(test)]
mod tests {
    use super::TopologyGraph;
    use crate::map::{LaneKey, TopologyError};
    use crate::utils::config::Config;
    use geom::vec3;

    #[test]
    fn stale_connector_is_reported() {
        let mut g = TopologyGraph::new(Config::default());
        let rtype = g.config.road_type("2Lane-2Way").unwrap().clone();
        let (r1, _) = g
            .add_road("a", &rtype, vec![vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)])
            .unwrap();
        g.add_road("b", &rtype, vec![vec3(40.0, 0.0, 0.0), vec3(80.0, 0.0, 0.0)])
            .unwrap();

        let key = LaneKey::new(r1, 0);
        let old = g.lanes().by_key(key).unwrap().connectors[0].clone();

        g.rebuild_all().unwrap();
        let id = g.lanes().id_of(key).unwrap();
        assert!(!g.lanes().is_current(old.from));
        g.lanes.get_mut(id).unwrap().connectors.push(old.clone());

        let Err(TopologyError::Invariants(errs)) = g.check_invariants() else {
            panic!("stale connector went unnoticed");
        };
        assert!(errs.iter().any(|e| *e
            == TopologyError::StaleConnector {
                from: old.from,
                to: old.to,
            }));
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let mut g = TopologyGraph::new(Config::default());
        let rtype = g.config.road_type("2Lane-2Way").unwrap().clone();
        let (r1, _) = g
            .add_road("a", &rtype, vec![vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)])
            .unwrap();

        let lane = g.lanes().by_key(LaneKey::new(r1, 0)).unwrap();
        let data = crate::map::LaneData {
            key: lane.key,
            points: lane.points.clone(),
            width: lane.width,
            vehicle_types: lane.vehicle_types,
            reversed: lane.reversed,
        };
        assert_eq!(
            g.lanes.register(data),
            Err(TopologyError::DuplicateLane(LaneKey::new(r1, 0)))
        );
        assert!(g.check_invariants().is_ok());
    }
}
