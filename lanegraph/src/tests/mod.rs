#![allow(dead_code)]
#![cfg(test)]

use crate::map::{InsertReport, LaneKey, RoadID, TopologyGraph};
use crate::utils::config::Config;
use common::logger::MyLog;
use geom::Vec3;

mod scenarios;

pub(crate) struct TestCtx {
    pub g: TopologyGraph,
}

impl TestCtx {
    pub(crate) fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub(crate) fn with_config(config: Config) -> Self {
        MyLog::init();
        Self {
            g: TopologyGraph::new(config),
        }
    }

    pub(crate) fn road(&mut self, preset: &str, markers: &[Vec3]) -> (RoadID, InsertReport) {
        let rtype = self.g.config.road_type(preset).unwrap().clone();
        let res = self.g.add_road(preset, &rtype, markers.to_vec()).unwrap();
        self.check();
        res
    }

    pub(crate) fn lane_points(&self, key: LaneKey) -> Vec<Vec3> {
        self.g.lanes().by_key(key).unwrap().points.as_slice().to_vec()
    }

    /// Invariants plus the properties every committed graph has
    pub(crate) fn check(&self) {
        self.g.check_invariants().unwrap();

        let lanes = self.g.lanes();
        for lane in lanes.iter() {
            assert!(lane.points.n_points() >= 2, "{:?}", lane.key);

            let mut travelled = 0.0;
            for w in lane.points.array_windows::<2>() {
                let d = w[0].distance(w[1]);
                assert!(d >= 0.0);
                travelled += d;
            }
            assert!((travelled - lane.points.length()).abs() < 1e-3);

            for c in &lane.connectors {
                let dst = lanes.get(c.to.id).unwrap();
                assert!(lanes.is_current(c.from));
                assert!(lanes.is_current(c.to));
                assert_eq!(c.from_point, lane.last_index());
                assert_eq!(c.to_point, 0);
                assert!(c.points.n_points() >= 2);
                let max = self.g.config.connector_distance;
                assert!(c.points.first().distance(lane.points.last()) <= max);
                assert!(c.points.last().distance(dst.points.first()) <= max);
            }
        }
    }

    pub(crate) fn connected(&self, from: LaneKey, to: LaneKey) -> bool {
        let lanes = self.g.lanes();
        let Some(dst) = lanes.id_of(to) else {
            return false;
        };
        lanes
            .by_key(from)
            .map_or(false, |l| l.connectors.iter().any(|c| c.to.id == dst))
    }
}
