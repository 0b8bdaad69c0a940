use crate::map::{
    Junction, Road, RoadEnd, Roads, TurnPolicy, VehicleTypeMask, CROSSWALK_WIDTH,
};
use crate::utils::config::Config;
use geom::{PolyLine3, Spline3, Vec2, Vec3};
use itertools::Itertools;

const TURN_ANG_ADD: f32 = 0.29;
const TURN_ANG_MUL: f32 = 0.36;
const TURN_MUL: f32 = 0.46;

/// Polyline of a single movement through a junction
#[derive(Clone, Debug, PartialEq)]
pub struct LanePath {
    pub points: PolyLine3,
    /// The path goes from its last point to its first point
    pub reversed: bool,
}

/// A lane owned by a junction, such as a crosswalk
#[derive(Clone, Debug)]
pub struct JunctionLane {
    pub index: usize,
    pub points: PolyLine3,
    pub width: f32,
    pub vehicle_types: VehicleTypeMask,
}

/// Turns markers and cross-sections into lane polylines.
/// The topology engine only sees geometry through this trait.
pub trait GeometryProvider: Send + Sync {
    /// Centerline through the markers, from the first to the last one
    fn road_centerline(&self, markers: &[Vec3]) -> Option<PolyLine3>;

    /// Centerline of one lane of the road, in the road's start -> end direction
    fn road_lane_centerline(&self, road: &Road, lane: usize) -> Option<PolyLine3>;

    fn junction_lanes(&self, roads: &Roads, junction: &Junction) -> Vec<JunctionLane>;

    /// Movement paths for the given lane of the road attached to `slot`
    fn junction_slot_lane_data(
        &self,
        roads: &Roads,
        junction: &Junction,
        slot: usize,
        lane: usize,
    ) -> Vec<LanePath>;

    /// Centerlines of the two halves of the road, the point at `idx` belonging to both
    fn split_road_at(&self, road: &Road, idx: usize) -> Option<(PolyLine3, PolyLine3)> {
        road.points.split_at_index(idx)
    }

    fn decimate(&self, points: &mut PolyLine3, tolerance: f32) {
        points.decimate(tolerance)
    }
}

/// Catmull-Rom road centerlines, offset lanes and cubic turn paths
#[derive(Clone, Debug)]
pub struct SplineGeometry {
    pub spline_step: f32,
    pub right_hand_driving: bool,
    pub turn_policy: TurnPolicy,
    pub turn_detail: usize,
}

impl SplineGeometry {
    pub fn new(config: &Config) -> Self {
        Self {
            spline_step: config.spline_step,
            right_hand_driving: config.right_hand_driving,
            turn_policy: TurnPolicy {
                back_turns: config.back_turns,
            },
            turn_detail: config.turn_detail,
        }
    }

    /// Cubic from `from` to `to` leaving along `from_dir` and arriving along `to_dir`
    pub fn turn_spline(from: Vec3, to: Vec3, from_dir: Vec2, to_dir: Vec2, max_handle: f32) -> Spline3 {
        let ang = from_dir.angle(to_dir);
        let dist = ((to - from).mag() * (TURN_ANG_ADD + ang.abs() * TURN_ANG_MUL) * TURN_MUL)
            .min(max_handle.max(0.0));

        Spline3 {
            from,
            to,
            from_derivative: (from_dir * dist).z0(),
            to_derivative: (to_dir * dist).z0(),
        }
    }

    fn turn_path(&self, from: Vec3, to: Vec3, from_dir: Vec2, to_dir: Vec2, max_handle: f32) -> PolyLine3 {
        if from.distance(to) < 1e-3 {
            return PolyLine3::new(vec![from, to]);
        }
        let spline = Self::turn_spline(from, to, from_dir, to_dir, max_handle);
        PolyLine3::new(spline.points(self.turn_detail + 2).collect())
    }
}

/// Terminal point and travel direction of a lane arriving at `end` of its road
fn arriving_end(points: &PolyLine3, end: RoadEnd) -> Option<(Vec3, Vec2)> {
    let n = points.n_points();
    if n < 2 {
        return None;
    }
    match end {
        RoadEnd::End => Some((points[n - 1], (points[n - 1] - points[n - 2]).xy().try_normalize()?)),
        RoadEnd::Start => Some((points[0], (points[0] - points[1]).xy().try_normalize()?)),
    }
}

/// Origin point and travel direction of a lane leaving `end` of its road
fn leaving_end(points: &PolyLine3, end: RoadEnd) -> Option<(Vec3, Vec2)> {
    let n = points.n_points();
    if n < 2 {
        return None;
    }
    match end {
        RoadEnd::Start => Some((points[0], (points[1] - points[0]).xy().try_normalize()?)),
        RoadEnd::End => Some((points[n - 1], (points[n - 2] - points[n - 1]).xy().try_normalize()?)),
    }
}

/// Offsets a polyline sideways, positive to the left, mitering the elbows
pub fn offset_polyline(points: &PolyLine3, offset: f32) -> Option<PolyLine3> {
    let middle = PolyLine3::try_new(
        points
            .iter()
            .copied()
            .dedup_by(|a, b| a.xy().distance2(b.xy()) < 1e-8)
            .collect(),
    )?;
    let src_nor = middle.first_dir()?.xy().try_normalize()?.perpendicular();
    let dst_nor = middle.last_dir()?.xy().try_normalize()?.perpendicular();

    let mut out = Vec::with_capacity(middle.n_points());
    out.push(middle.first() + (src_nor * offset).z0());

    for [a, elbow, c] in middle.array_windows::<3>() {
        let x = unwrap_contlog!((*elbow - *a).xy().try_normalize(), "elbow too close to a");
        let y = unwrap_contlog!((*c - *elbow).xy().try_normalize(), "elbow too close to c");

        let (nx, ny) = (x.perpendicular(), y.perpendicular());
        let dir = (nx + ny).try_normalize().unwrap_or(nx);
        let mul = 1.0 / dir.dot(nx).max(0.5);

        out.push(*elbow + (dir * (mul * offset)).z0());
    }

    out.push(middle.last() + (dst_nor * offset).z0());

    if out.len() < 2 {
        return None;
    }
    Some(PolyLine3::new(out))
}

impl GeometryProvider for SplineGeometry {
    fn road_centerline(&self, markers: &[Vec3]) -> Option<PolyLine3> {
        profiling::scope!("geometry::road_centerline");
        if markers.len() < 2 || !markers.iter().all(|m| m.is_finite()) {
            return None;
        }
        let step = self.spline_step.max(0.01);
        let n = markers.len();
        let mut points = Vec::with_capacity(n * 2);

        for i in 0..n - 1 {
            let p1 = markers[i];
            let p2 = markers[i + 1];
            let p0 = if i > 0 { markers[i - 1] } else { 2.0 * p1 - p2 };
            let p3 = if i + 2 < n { markers[i + 2] } else { 2.0 * p2 - p1 };

            let spline = Spline3::catmull_rom(p0, p1, p2, p3);
            let k = ((p1.distance(p2) / step - 1e-3).ceil() as usize).max(1);
            for j in 0..k {
                points.push(spline.get(j as f32 / k as f32));
            }
        }
        points.push(markers[n - 1]);

        Some(PolyLine3::new(points))
    }

    fn road_lane_centerline(&self, road: &Road, lane: usize) -> Option<PolyLine3> {
        if lane >= road.n_lanes() {
            return None;
        }
        offset_polyline(&road.points, road.lane_offset(lane, self.right_hand_driving))
    }

    fn junction_lanes(&self, roads: &Roads, junction: &Junction) -> Vec<JunctionLane> {
        if !junction.kind.is_crossing() || !junction.crosswalks {
            return vec![];
        }

        junction
            .attached()
            .filter_map(|(slot, road_id, _)| {
                let road = roads.get(road_id)?;
                let dir = junction.slot_dir(slot);
                let center = junction.slot_mouth(slot) - (dir * (CROSSWALK_WIDTH * 0.5)).z0();
                let side = (dir.perpendicular() * (road.width * 0.5)).z0();

                Some(JunctionLane {
                    index: slot,
                    points: PolyLine3::new(vec![center - side, center + side]),
                    width: CROSSWALK_WIDTH,
                    vehicle_types: VehicleTypeMask::PEDESTRIAN,
                })
            })
            .collect()
    }

    fn junction_slot_lane_data(
        &self,
        roads: &Roads,
        junction: &Junction,
        slot: usize,
        lane: usize,
    ) -> Vec<LanePath> {
        let (road_id, end) = unwrap_ret!(junction.slots.get(slot).and_then(|s| s.road), vec![]);
        let road = unwrap_ret!(roads.get(road_id), vec![]);

        let incoming: Vec<usize> = road.lanes_arriving_at(end).collect();
        let rank = unwrap_ret!(incoming.iter().position(|&l| l == lane), vec![]);
        let src_points = unwrap_ret!(self.road_lane_centerline(road, lane), vec![]);
        let (from, from_dir) = unwrap_ret!(arriving_end(&src_points, end), vec![]);

        let mut paths = vec![];

        for (t, s) in junction.slots.iter().enumerate() {
            let (road2_id, end2) = unwrap_cont!(s.road);
            if !self.turn_policy.allows(slot, t) {
                continue;
            }
            let road2 = unwrap_cont!(roads.get(road2_id));
            if road2.kind != road.kind || !road2.vehicle_types.intersects(road.vehicle_types) {
                continue;
            }

            let outgoing: Vec<usize> = road2.lanes_leaving(end2).collect();
            for dst in TurnPolicy::targets(rank, incoming.len(), &outgoing) {
                let dst_points = unwrap_cont!(self.road_lane_centerline(road2, dst));
                let (to, to_dir) = unwrap_cont!(leaving_end(&dst_points, end2));

                paths.push(LanePath {
                    points: self.turn_path(from, to, from_dir, to_dir, junction.corner_radius),
                    reversed: false,
                });
            }
        }

        paths
    }
}
