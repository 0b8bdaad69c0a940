use crate::map::{Connector, GeometryProvider, Junctions, LaneKey, LaneStore, RoadEnd, Roads};
use common::FastSet;

/// Derives every connector from scratch out of the junction movement paths
pub struct ConnectorWirer<'a> {
    pub geometry: &'a dyn GeometryProvider,
    /// Max distance between a path end and the lane point it resolves to
    pub max_distance: f32,
}

impl<'a> ConnectorWirer<'a> {
    pub fn new(geometry: &'a dyn GeometryProvider, max_distance: f32) -> Self {
        Self {
            geometry,
            max_distance,
        }
    }

    /// Drops all connectors and wires them again. Returns the number of connectors created.
    /// Paths whose ends don't both resolve to a lane are skipped.
    pub fn wire(&self, roads: &Roads, junctions: &mut Junctions, lanes: &mut LaneStore) -> usize {
        profiling::scope!("wiring::wire");
        lanes.clear_connectors();

        let mut seen = FastSet::default();
        let mut created = 0;

        for road in roads.values() {
            for lane in 0..road.n_lanes() {
                if lanes.id_of(LaneKey::new(road.id, lane)).is_none() {
                    continue;
                }
                for end in RoadEnd::BOTH {
                    let att = unwrap_cont!(road.attachment(end));
                    let junction = unwrap_contlog!(
                        junctions.get_mut(att.junction),
                        "road {:?} attached to missing junction {:?}",
                        road.id,
                        att.junction
                    );

                    let paths = match junction.path_cache.get(&(att.slot, lane)) {
                        Some(p) => p.clone(),
                        None => {
                            let p = self
                                .geometry
                                .junction_slot_lane_data(roads, junction, att.slot, lane);
                            junction.path_cache.insert((att.slot, lane), p.clone());
                            p
                        }
                    };

                    for path in paths {
                        let points = if path.reversed {
                            path.points.reversed()
                        } else {
                            path.points
                        };

                        let from = unwrap_cont!(
                            lanes.nearest_last_point(points.first(), self.max_distance)
                        );
                        let to = unwrap_cont!(
                            lanes.nearest_first_point(points.last(), self.max_distance)
                        );
                        if !seen.insert((from.id, to.id)) {
                            continue;
                        }

                        let src = unwrap_cont!(lanes.get_mut(from.id));
                        let from_point = src.last_index();
                        src.connectors.push(Connector {
                            junction: att.junction,
                            from,
                            from_point,
                            to,
                            to_point: 0,
                            points,
                        });
                        created += 1;
                    }
                }
            }
        }

        log::debug!("wired {} connectors", created);
        created
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectorWirer;
    use crate::map::{
        GeometryProvider, Junction, JunctionKind, JunctionLane, Junctions, LaneKey, LanePath,
        LaneStore, Road, RoadEnd, RoadKind, Roads, SlotRef, SplineGeometry, LaneData,
        VehicleTypeMask,
    };
    use crate::utils::config::Config;
    use geom::{vec3, PolyLine3, Vec3};

    /// Wraps the spline provider, returning its paths end to start
    struct Reversing(SplineGeometry);

    impl GeometryProvider for Reversing {
        fn road_centerline(&self, markers: &[Vec3]) -> Option<PolyLine3> {
            self.0.road_centerline(markers)
        }

        fn road_lane_centerline(&self, road: &Road, lane: usize) -> Option<PolyLine3> {
            self.0.road_lane_centerline(road, lane)
        }

        fn junction_lanes(&self, roads: &Roads, junction: &Junction) -> Vec<JunctionLane> {
            self.0.junction_lanes(roads, junction)
        }

        fn junction_slot_lane_data(
            &self,
            roads: &Roads,
            junction: &Junction,
            slot: usize,
            lane: usize,
        ) -> Vec<LanePath> {
            self.0
                .junction_slot_lane_data(roads, junction, slot, lane)
                .into_iter()
                .map(|p| LanePath {
                    points: p.points.reversed(),
                    reversed: true,
                })
                .collect()
        }
    }

    fn setup(g: &dyn GeometryProvider) -> (Roads, Junctions, LaneStore) {
        let config = Config::default();
        let rt = config.road_type("2Lane-2Way").unwrap();
        let mut roads = Roads::default();
        let mut junctions = Junctions::default();
        let mut lanes = LaneStore::default();

        let j = junctions.insert_with_key(|id| {
            Junction::new(id, JunctionKind::Flex, RoadKind::Road, vec3(20.0, 0.0, 0.0), 0.0, 0.0, 4.0, false)
        });
        let mk = |roads: &mut Roads, a: Vec3, b: Vec3| {
            let markers = vec![a, b];
            let points = g.road_centerline(&markers).unwrap();
            roads.insert_with_key(|id| Road::new(id, "r".into(), rt, markers, points))
        };
        let r1 = mk(&mut roads, vec3(0.0, 0.0, 0.0), vec3(20.0, 0.0, 0.0));
        let r2 = mk(&mut roads, vec3(20.0, 0.0, 0.0), vec3(20.0, 20.0, 0.0));

        roads[r1].set_attachment(RoadEnd::End, Some(SlotRef { junction: j, slot: 0 }));
        roads[r2].set_attachment(RoadEnd::Start, Some(SlotRef { junction: j, slot: 1 }));
        junctions[j].slots[0].road = Some((r1, RoadEnd::End));
        junctions[j].slots[1].road = Some((r2, RoadEnd::Start));

        for r in roads.values() {
            for lane in 0..r.n_lanes() {
                let mut points = g.road_lane_centerline(r, lane).unwrap();
                if r.is_backward(lane) {
                    points.reverse();
                }
                lanes
                    .register(LaneData {
                        key: LaneKey::new(r.id, lane),
                        points,
                        width: 3.0,
                        vehicle_types: VehicleTypeMask::VEHICLES,
                        reversed: r.is_backward(lane),
                    })
                    .unwrap();
            }
        }
        (roads, junctions, lanes)
    }

    fn check(g: &dyn GeometryProvider) {
        let (roads, mut junctions, mut lanes) = setup(g);
        let w = ConnectorWirer::new(g, 1.0);
        assert_eq!(w.wire(&roads, &mut junctions, &mut lanes), 2);

        for l in lanes.iter() {
            for c in &l.connectors {
                assert_eq!(c.from, l.lane_ref());
                assert_eq!(c.from_point, l.last_index());
                assert_eq!(c.to_point, 0);
                let dst = lanes.get(c.to.id).unwrap();
                assert!(c.points.first().distance(l.points.last()) < 1e-3);
                assert!(c.points.last().distance(dst.points.first()) < 1e-3);
            }
        }

        // rewiring is a full rebuild
        assert_eq!(w.wire(&roads, &mut junctions, &mut lanes), 2);
        assert_eq!(lanes.n_connectors(), 2);
    }

    #[test]
    fn wires_through_flex() {
        check(&SplineGeometry::new(&Config::default()));
    }

    #[test]
    fn reversed_paths_are_flipped() {
        check(&Reversing(SplineGeometry::new(&Config::default())));
    }
}
