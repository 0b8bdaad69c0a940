use crate::map::{
    GeometryProvider, Junction, JunctionID, JunctionKind, JunctionLane, LaneKey, LaneOwner,
    LanePath, Road, RoadEnd, RoadID, RoadKind, Roads, SplineGeometry, TopologyError,
    TopologyGraph, VehicleTypeMask,
};
use crate::tests::TestCtx;
use crate::utils::config::Config;
use geom::{vec3, PolyLine3, Vec3};
use std::sync::Arc;

#[test]
fn free_standing_road() {
    let mut ctx = TestCtx::new();
    let (r1, report) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);

    assert_eq!(report.free_ends, vec![RoadEnd::Start, RoadEnd::End]);
    assert!(report.junctions.is_empty() && report.splits.is_empty());
    assert_eq!(ctx.g.lanes().len(), 2);
    assert_eq!(ctx.g.lanes().n_connectors(), 0);
    assert!(ctx.g.junctions().is_empty());

    let fwd = ctx.lane_points(LaneKey::new(r1, 0));
    let bwd = ctx.lane_points(LaneKey::new(r1, 1));
    assert!(fwd[0].x < fwd[fwd.len() - 1].x);
    assert!(bwd[0].x > bwd[bwd.len() - 1].x);
}

#[test]
fn end_to_end_join() {
    let mut ctx = TestCtx::new();
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    let (r2, report) = ctx.road("2Lane-2Way", &[vec3(41.0, 1.0, 0.0), vec3(80.0, 0.0, 0.0)]);

    assert_eq!(report.joined, vec![(r1, RoadEnd::End)]);
    assert_eq!(ctx.g.junctions().len(), 1);
    let j = ctx.g.junctions().values().next().unwrap();
    assert_eq!(j.kind, JunctionKind::Flex);
    assert_eq!(j.n_attached(), 2);
    assert_eq!(ctx.g.roads()[r2].end_marker(RoadEnd::Start), vec3(40.0, 0.0, 0.0));

    assert_eq!(ctx.g.lanes().n_connectors(), 2);
    assert!(ctx.connected(LaneKey::new(r1, 0), LaneKey::new(r2, 0)));
    assert!(ctx.connected(LaneKey::new(r2, 1), LaneKey::new(r1, 1)));
    assert!(!ctx.connected(LaneKey::new(r1, 0), LaneKey::new(r1, 1)));
}

#[test]
fn short_road_with_both_ends_on_one_end() {
    let mut ctx = TestCtx::new();
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    let (s, report) = ctx.road("2Lane-2Way", &[vec3(40.5, 0.5, 0.0), vec3(41.5, 2.0, 0.0)]);

    assert_eq!(report.joined, vec![(r1, RoadEnd::End)]);
    assert_eq!(report.free_ends, vec![RoadEnd::End]);
    assert_eq!(ctx.g.junctions().len(), 1);

    let road = &ctx.g.roads()[s];
    assert_eq!(road.end_marker(RoadEnd::Start), vec3(40.0, 0.0, 0.0));
    assert_eq!(road.end_marker(RoadEnd::End), vec3(41.5, 2.0, 0.0));
    assert!(road.is_free(RoadEnd::End));

    assert_eq!(ctx.g.lanes().len(), 4);
    assert!(ctx.connected(LaneKey::new(r1, 0), LaneKey::new(s, 0)));
}

#[test]
fn mid_span_split() {
    let mut ctx = TestCtx::new();
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    let original = ctx.g.roads()[r1].points.clone();

    let (r3, report) = ctx.road("2Lane-2Way", &[vec3(20.0, 30.0, 0.0), vec3(20.0, 1.0, 0.0)]);

    assert_eq!(report.splits.len(), 1);
    let split = report.splits[0];
    assert!(ctx.g.roads().get(r1).is_none());
    assert_eq!(ctx.g.roads().len(), 3);

    let j = &ctx.g.junctions()[split.junction];
    assert!(j.branching);
    assert_eq!(j.n_attached(), 3);
    assert_eq!(j.slot_of(r3, RoadEnd::End), Some(2));

    let before = &ctx.g.roads()[split.before].points;
    let after = &ctx.g.roads()[split.after].points;
    let mut joined = before.as_slice().to_vec();
    joined.extend_from_slice(&after.as_slice()[1..]);
    assert_eq!(joined.as_slice(), original.as_slice());

    // 3 arriving lanes, each going to the 2 other roads
    assert_eq!(ctx.g.lanes().len(), 6);
    assert_eq!(ctx.g.lanes().n_connectors(), 6);
    assert!(ctx.connected(LaneKey::new(split.before, 0), LaneKey::new(split.after, 0)));
    assert!(ctx.connected(LaneKey::new(split.after, 1), LaneKey::new(split.before, 1)));
    assert!(ctx.connected(LaneKey::new(r3, 0), LaneKey::new(split.after, 0)));
    assert!(ctx.connected(LaneKey::new(r3, 0), LaneKey::new(split.before, 1)));
    assert!(ctx.connected(LaneKey::new(split.before, 0), LaneKey::new(r3, 1)));
}

#[test]
fn split_reproduces_the_whole_road() {
    let mut ctx = TestCtx::new();
    let markers = [
        vec3(0.0, 0.0, 0.0),
        vec3(20.0, 10.0, 0.0),
        vec3(40.0, 0.0, 0.0),
    ];
    let (r, _) = ctx.road("4Lane-2Way", &markers);
    let original = ctx.g.roads()[r].points.clone();
    let original_lanes: Vec<Vec<Vec3>> = (0..4)
        .map(|l| ctx.lane_points(LaneKey::new(r, l)))
        .collect();

    let idx = original.n_points() / 2;
    let split = ctx.g.split_road(r, idx).unwrap();
    ctx.check();

    let before = ctx.g.roads()[split.before].points.clone();
    let after = ctx.g.roads()[split.after].points.clone();
    assert_eq!(before.last(), original[idx]);
    assert_eq!(after.first(), original[idx]);
    assert_eq!(before.n_points() + after.n_points() - 1, original.n_points());

    let tolerance = ctx.g.config.decimation_tolerance;
    for (lane, whole) in original_lanes.iter().enumerate() {
        let whole = PolyLine3::new(whole.clone());
        for stub in [split.before, split.after] {
            for p in ctx.lane_points(LaneKey::new(stub, lane)) {
                assert!(
                    whole.project_dist(p) <= tolerance + 1e-2,
                    "lane {} point {:?} is off by {}",
                    lane,
                    p,
                    whole.project_dist(p)
                );
            }
        }
        let b = ctx.lane_points(LaneKey::new(split.before, lane));
        let a = ctx.lane_points(LaneKey::new(split.after, lane));
        let (first, last) = if lane < 2 {
            (b[0], a[a.len() - 1])
        } else {
            (a[0], b[b.len() - 1])
        };
        assert!(first.distance(whole.first()) < 1e-3);
        assert!(last.distance(whole.last()) < 1e-3);
    }

    // through traffic keeps flowing across the split
    assert!(ctx.connected(LaneKey::new(split.before, 0), LaneKey::new(split.after, 0)));
    assert!(ctx.connected(LaneKey::new(split.before, 1), LaneKey::new(split.after, 1)));
    assert!(ctx.connected(LaneKey::new(split.after, 2), LaneKey::new(split.before, 2)));
}

#[test]
fn split_near_tip_is_refused() {
    let mut ctx = TestCtx::new();
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    let (_, report) = ctx.road("2Lane-2Way", &[vec3(36.0, 30.0, 0.0), vec3(36.0, 1.0, 0.0)]);

    assert!(report.splits.is_empty());
    assert_eq!(report.free_ends, vec![RoadEnd::Start, RoadEnd::End]);
    assert!(ctx.g.roads().get(r1).is_some());
    assert_eq!(ctx.g.lanes().n_connectors(), 0);

    assert_eq!(
        ctx.g.split_road(r1, 0).err(),
        Some(TopologyError::InvalidRoad("split point must be interior"))
    );
}

#[test]
fn footpaths_ignore_roads() {
    let mut ctx = TestCtx::new();
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    let (f, report) = ctx.road("Footpath", &[vec3(20.0, 30.0, 0.0), vec3(20.0, 1.0, 0.0)]);

    assert!(report.splits.is_empty());
    assert!(ctx.g.roads().get(r1).is_some());
    assert_eq!(ctx.g.roads()[f].kind, RoadKind::Footpath);
    assert!(ctx
        .g
        .lanes()
        .of_owner(LaneOwner::Road(f))
        .all(|l| l.vehicle_types == VehicleTypeMask::PEDESTRIAN));
}

fn crossing_world() -> (TestCtx, JunctionID, Vec<RoadID>) {
    let mut ctx = TestCtx::new();
    let (w, _) = ctx.road("2Lane-2Way", &[vec3(60.0, 0.0, 0.0), vec3(94.5, 0.0, 0.0)]);
    let (n, _) = ctx.road("2Lane-2Way", &[vec3(100.0, 40.0, 0.0), vec3(100.0, 6.5, 0.0)]);
    let (e, _) = ctx.road("2Lane-2Way", &[vec3(106.0, 0.0, 0.0), vec3(140.0, 0.0, 0.0)]);

    let (j, attached) = ctx
        .g
        .add_junction(JunctionKind::CrossingX, vec3(100.0, 0.0, 0.0), 0.0)
        .unwrap();
    ctx.check();
    assert_eq!(attached.len(), 3);
    (ctx, j, vec![w, n, e])
}

#[test]
fn crossing_placement_attaches_nearby_ends() {
    let (ctx, j, roads) = crossing_world();
    let junction = &ctx.g.junctions()[j];

    assert!(junction.branching);
    assert_eq!(junction.slot_of(roads[0], RoadEnd::End), Some(2));
    assert_eq!(junction.slot_of(roads[1], RoadEnd::End), Some(1));
    assert_eq!(junction.slot_of(roads[2], RoadEnd::Start), Some(0));
    assert_eq!(
        ctx.g.roads()[roads[0]].end_marker(RoadEnd::End),
        junction.slot_mouth(2)
    );

    // 3 crosswalks and 3 * 2 lanes
    assert_eq!(ctx.g.lanes().len(), 9);
    assert_eq!(
        ctx.g
            .lanes()
            .of_owner(j.into())
            .filter(|l| l.vehicle_types == VehicleTypeMask::PEDESTRIAN)
            .count(),
        3
    );
    assert_eq!(ctx.g.lanes().n_connectors(), 6);
    assert!(ctx.connected(LaneKey::new(roads[0], 0), LaneKey::new(roads[2], 0)));
    assert!(ctx.connected(LaneKey::new(roads[0], 0), LaneKey::new(roads[1], 1)));
    assert!(!ctx.connected(LaneKey::new(roads[0], 0), LaneKey::new(roads[0], 1)));
}

#[test]
fn road_drawn_into_crossing() {
    let (mut ctx, j, _) = crossing_world();
    let (s, report) = ctx.road("2Lane-2Way", &[vec3(100.0, -40.0, 0.0), vec3(100.0, -7.0, 0.0)]);

    assert_eq!(report.junctions, vec![j]);
    assert_eq!(ctx.g.junctions()[j].slot_of(s, RoadEnd::End), Some(3));
    assert!(!ctx.g.junctions()[j].has_free_slot());
    assert_eq!(ctx.g.lanes().n_connectors(), 12);

    // a full crossing is not matched anymore, the end stays free
    let (_, report) = ctx.road("2Lane-2Way", &[vec3(70.0, -40.0, 0.0), vec3(100.0, -5.5, 0.0)]);
    assert_eq!(report.free_ends, vec![RoadEnd::Start, RoadEnd::End]);
    assert_eq!(ctx.g.lanes().n_connectors(), 12);
}

#[test]
fn back_turns_add_u_turns() {
    let mut config = Config::default();
    config.back_turns = true;
    let mut ctx = TestCtx::with_config(config);
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    let (r2, _) = ctx.road("2Lane-2Way", &[vec3(40.0, 0.0, 0.0), vec3(80.0, 0.0, 0.0)]);

    assert_eq!(ctx.g.lanes().n_connectors(), 4);
    assert!(ctx.connected(LaneKey::new(r1, 0), LaneKey::new(r1, 1)));
    assert!(ctx.connected(LaneKey::new(r2, 1), LaneKey::new(r2, 0)));
}

#[test]
fn rebuild_is_idempotent() {
    let (mut ctx, _, _) = crossing_world();
    ctx.road("2Lane-2Way", &[vec3(0.0, 30.0, 0.0), vec3(60.0, 30.0, 0.0)]);
    ctx.road("2Lane-2Way", &[vec3(30.0, 60.0, 0.0), vec3(30.0, 31.0, 0.0)]);
    ctx.road("4Lane-2Way", &[vec3(61.0, 30.0, 0.0), vec3(90.0, 60.0, 0.0)]);

    let before = ctx.g.lane_snapshot();
    let n_connectors = ctx.g.lanes().n_connectors();
    ctx.g.rebuild_all().unwrap();
    ctx.check();
    assert_eq!(ctx.g.lane_snapshot(), before);
    assert_eq!(ctx.g.lanes().n_connectors(), n_connectors);

    ctx.g.rebuild_connectors();
    assert_eq!(ctx.g.lane_snapshot(), before);
}

#[test]
fn rebuild_replaces_lane_generations() {
    let mut ctx = TestCtx::new();
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    ctx.road("2Lane-2Way", &[vec3(40.0, 0.0, 0.0), vec3(80.0, 0.0, 0.0)]);

    let old = ctx.g.lanes().by_key(LaneKey::new(r1, 0)).unwrap().lane_ref();
    ctx.g.rebuild_all().unwrap();
    let new = ctx.g.lanes().by_key(LaneKey::new(r1, 0)).unwrap().lane_ref();

    assert_ne!(old.generation, new.generation);
    assert!(!ctx.g.lanes().is_current(old));
    for c in ctx.g.lanes().connectors() {
        assert_ne!(c.from, old);
        assert_ne!(c.to, old);
    }
}

#[test]
fn connected_queries() {
    let mut ctx = TestCtx::new();
    let a = vec3(0.0, 0.0, 0.0);
    let b = vec3(40.0, 0.0, 0.0);
    let (r1, _) = ctx.road("2Lane-2Way", &[a, b]);

    let found = ctx.g.connected_roads(b, vec3(500.0, 0.0, 0.0), None);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].road, r1);
    assert_eq!(found[0].marker_index, 1);
    assert_eq!(found[0].end, RoadEnd::Start);
    assert!(ctx.g.connected_roads(a, b, Some(r1)).is_empty());

    let j = ctx
        .g
        .create_junction(JunctionKind::CrossingT, vec3(0.0, 100.0, 0.0), 0.0);
    let slots = ctx.g.connected_junctions(vec3(6.5, 100.0, 0.0), 1.0);
    assert_eq!(slots, vec![(j, 0)]);
    assert!(ctx.g.connected_junctions(vec3(0.0, 0.0, 0.0), 1.0).is_empty());
}

#[test]
fn unknown_ids_are_errors() {
    let mut ctx = TestCtx::new();
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    let split = ctx.g.split_road(r1, 10).unwrap();

    assert_eq!(
        ctx.g.insert_road(r1).err(),
        Some(TopologyError::UnknownRoad(r1))
    );
    assert!(ctx.g.roads().get(split.before).is_some());

    let rtype = ctx.g.config.road_type("2Lane-2Way").unwrap().clone();
    assert!(matches!(
        ctx.g.create_road("bad", &rtype, vec![vec3(1.0, 1.0, 0.0)]),
        Err(TopologyError::InvalidRoad(_))
    ));
    assert!(matches!(
        ctx.g.create_road("bad", &rtype, vec![vec3(1.0, 1.0, 0.0), vec3(1.0, 1.0, 0.0)]),
        Err(TopologyError::InvalidRoad(_))
    ));
    ctx.check();
}

/// Spline geometry whose junction lanes are always degenerate
struct BrokenCrosswalks(SplineGeometry);

impl GeometryProvider for BrokenCrosswalks {
    fn road_centerline(&self, markers: &[Vec3]) -> Option<PolyLine3> {
        self.0.road_centerline(markers)
    }

    fn road_lane_centerline(&self, road: &Road, lane: usize) -> Option<PolyLine3> {
        self.0.road_lane_centerline(road, lane)
    }

    fn junction_lanes(&self, roads: &Roads, junction: &Junction) -> Vec<JunctionLane> {
        self.0
            .junction_lanes(roads, junction)
            .into_iter()
            .map(|mut l| {
                l.points = PolyLine3::new(vec![l.points.first()]);
                l
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
        self.0.junction_slot_lane_data(roads, junction, slot, lane)
    }
}

#[test]
fn failed_commit_restores_the_graph() {
    common::logger::MyLog::init();
    let config = Config::default();
    let geometry = Arc::new(BrokenCrosswalks(SplineGeometry::new(&config)));
    let mut g = TopologyGraph::with_geometry(config, geometry);

    let rtype = g.config.road_type("2Lane-2Way").unwrap().clone();
    let (w, _) = g
        .add_road("w", &rtype, vec![vec3(60.0, 0.0, 0.0), vec3(94.5, 0.0, 0.0)])
        .unwrap();
    let snapshot = g.lane_snapshot();

    let res = g.add_junction(JunctionKind::CrossingX, vec3(100.0, 0.0, 0.0), 0.0);
    assert!(matches!(res, Err(TopologyError::DegenerateLane(_))));

    assert!(g.junctions().is_empty());
    assert!(g.roads()[w].is_free(RoadEnd::End));
    assert_eq!(g.roads()[w].end_marker(RoadEnd::End), vec3(94.5, 0.0, 0.0));
    assert_eq!(g.lane_snapshot(), snapshot);
    g.check_invariants().unwrap();
}

#[test]
fn traffic_light_movements() {
    let mut ctx = TestCtx::new();
    let (r1, _) = ctx.road("2Lane-2Way", &[vec3(0.0, 0.0, 0.0), vec3(40.0, 0.0, 0.0)]);
    let (r2, _) = ctx.road("2Lane-2Way", &[vec3(40.0, 0.0, 0.0), vec3(80.0, 0.0, 0.0)]);
    let light = ctx.g.create_traffic_light(vec3(40.0, 5.0, 0.0), 0.0);

    let from = LaneKey::new(r1, 0);
    let to = LaneKey::new(r2, 0);
    assert_eq!(ctx.g.connect_lanes(light, from, to), Ok(true));
    assert_eq!(ctx.g.connect_lanes(light, from, to), Ok(false));
    // no connector between these
    assert_eq!(ctx.g.connect_lanes(light, from, LaneKey::new(r1, 1)), Ok(false));
    assert_eq!(
        ctx.g.connect_lanes(light, from, LaneKey::new(r2, 7)),
        Err(TopologyError::MissingLane(LaneKey::new(r2, 7)))
    );
    assert_eq!(ctx.g.controlled_lanes(light).unwrap(), &[(from, to)]);

    ctx.g.rebuild_all().unwrap();
    assert_eq!(ctx.g.controlled_lanes(light).unwrap(), &[(from, to)]);

    // the movement follows the stub that now touches the light's junction
    let split = ctx.g.split_road(r2, 20).unwrap();
    let to = LaneKey::new(split.before, 0);
    assert_eq!(ctx.g.controlled_lanes(light).unwrap(), &[(from, to)]);

    ctx.g.move_traffic_light(light, vec3(41.0, 5.0, 0.0), 1.0).unwrap();
    assert_eq!(ctx.g.traffic_lights()[light].pos, vec3(41.0, 5.0, 0.0));
    assert_delta!(ctx.g.traffic_lights()[light].cycle_duration(), 26.0, 1e-5);

    assert_eq!(ctx.g.disconnect_lanes(light, from, to), Ok(true));
    assert_eq!(ctx.g.disconnect_lanes(light, from, to), Ok(false));
    assert!(ctx.g.controlled_lanes(light).unwrap().is_empty());
}
