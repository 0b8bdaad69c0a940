use crate::map::{
    GeometryProvider, Junction, Junctions, LaneKey, LaneOwner, Road, Roads, TopologyError,
    VehicleTypeMask,
};
use geom::PolyLine3;

/// A lane ready to be registered, not yet part of the graph
#[derive(Clone, Debug)]
pub struct LaneData {
    pub key: LaneKey,
    pub points: PolyLine3,
    pub width: f32,
    pub vehicle_types: VehicleTypeMask,
    pub reversed: bool,
}

/// Builds lanes from the centerlines given by the geometry provider.
/// Pure: the caller is responsible for discarding the previous lanes before registering.
#[derive(Copy, Clone)]
pub struct LaneSynthesizer<'a> {
    pub geometry: &'a dyn GeometryProvider,
    pub tolerance: f32,
}

impl<'a> LaneSynthesizer<'a> {
    pub fn new(geometry: &'a dyn GeometryProvider, tolerance: f32) -> Self {
        Self {
            geometry,
            tolerance,
        }
    }

    pub fn synthesize(
        &self,
        key: LaneKey,
        centerline: Option<PolyLine3>,
        width: f32,
        vehicle_types: VehicleTypeMask,
        reverse: bool,
    ) -> Result<LaneData, TopologyError> {
        let mut points = centerline.ok_or(TopologyError::DegenerateLane(key))?;
        if reverse {
            points.reverse();
        }
        self.geometry.decimate(&mut points, self.tolerance);

        if points.n_points() < 2 || !points.iter().all(|p| p.is_finite()) {
            return Err(TopologyError::DegenerateLane(key));
        }

        Ok(LaneData {
            key,
            points,
            width,
            vehicle_types,
            reversed: reverse,
        })
    }

    /// Every lane of the road, backward lanes being reversed so they run end -> start
    pub fn road_lanes(&self, road: &Road) -> Result<Vec<LaneData>, TopologyError> {
        (0..road.n_lanes())
            .map(|lane| {
                self.synthesize(
                    LaneKey::new(road.id, lane),
                    self.geometry.road_lane_centerline(road, lane),
                    road.lane_width(),
                    road.vehicle_types,
                    road.is_backward(lane),
                )
            })
            .collect()
    }

    pub fn junction_lanes(
        &self,
        roads: &Roads,
        junction: &Junction,
    ) -> Result<Vec<LaneData>, TopologyError> {
        self.geometry
            .junction_lanes(roads, junction)
            .into_iter()
            .map(|jl| {
                self.synthesize(
                    LaneKey::new(junction.id, jl.index),
                    Some(jl.points),
                    jl.width,
                    jl.vehicle_types,
                    false,
                )
            })
            .collect()
    }

    pub fn owner_lanes(
        &self,
        owner: LaneOwner,
        roads: &Roads,
        junctions: &Junctions,
    ) -> Result<Vec<LaneData>, TopologyError> {
        match owner {
            LaneOwner::Road(id) => {
                let road = roads.get(id).ok_or(TopologyError::UnknownRoad(id))?;
                self.road_lanes(road)
            }
            LaneOwner::Junction(id) => {
                let junction = junctions.get(id).ok_or(TopologyError::UnknownJunction(id))?;
                self.junction_lanes(roads, junction)
            }
        }
    }
}
