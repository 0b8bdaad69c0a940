use crate::map::{JunctionID, Junctions, RoadEnd, RoadID, RoadKind, Roads};
use geom::Vec3;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// How ties between several junctions within tolerance are broken
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JunctionMatch {
    /// The junction closest to the query wins
    #[default]
    Nearest,
    /// The first junction within tolerance in arena order wins
    FirstFound,
}

/// What a road end position falls on
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpatialMatch {
    Junction(JunctionID),
    RoadEndpoint(RoadID, RoadEnd),
    /// Interior centerline point index of the road
    RoadMidSpan(RoadID, usize),
    Free,
}

/// Proximity queries over the current roads and junctions.
/// All queries are linear scans, no match is not an error.
pub struct SpatialMatcher<'a> {
    pub roads: &'a Roads,
    pub junctions: &'a Junctions,
    pub policy: JunctionMatch,
    pub max_distance: f32,
}

impl<'a> SpatialMatcher<'a> {
    pub fn new(
        roads: &'a Roads,
        junctions: &'a Junctions,
        policy: JunctionMatch,
        max_distance: f32,
    ) -> Self {
        Self {
            roads,
            junctions,
            policy,
            max_distance,
        }
    }

    /// Junction accepting roads of the given kind that still has a free slot
    pub fn nearest_junction(&self, pos: Vec3, kind: RoadKind) -> Option<JunctionID> {
        let mut candidates = self
            .junctions
            .values()
            .filter(|j| j.accepts(kind) && j.has_free_slot())
            .map(|j| (j.id, j.match_distance(pos)))
            .filter(|&(_, d)| d <= self.max_distance);

        match self.policy {
            JunctionMatch::Nearest => candidates
                .min_by_key(|&(_, d)| OrderedFloat(d))
                .map(|(id, _)| id),
            JunctionMatch::FirstFound => candidates.next().map(|(id, _)| id),
        }
    }

    /// Free end marker of a road of the same kind
    pub fn nearest_road_endpoint(
        &self,
        pos: Vec3,
        kind: RoadKind,
        excluding: Option<RoadID>,
    ) -> Option<(RoadID, RoadEnd)> {
        self.roads
            .values()
            .filter(|r| r.kind == kind && Some(r.id) != excluding)
            .flat_map(|r| {
                RoadEnd::BOTH
                    .into_iter()
                    .filter(move |&e| r.is_free(e))
                    .map(move |e| (r.id, e, r.end_marker(e).distance(pos)))
            })
            .filter(|&(_, _, d)| d <= self.max_distance)
            .min_by_key(|&(_, _, d)| OrderedFloat(d))
            .map(|(id, e, _)| (id, e))
    }

    /// Interior centerline point of a road of the same kind.
    /// Roads whose own end markers are within twice the tolerance are never matched,
    /// so a road is not split right next to its tip.
    pub fn nearest_road_midspan(
        &self,
        pos: Vec3,
        kind: RoadKind,
        excluding: Option<RoadID>,
    ) -> Option<(RoadID, usize)> {
        let guard = 2.0 * self.max_distance;
        self.roads
            .values()
            .filter(|r| r.kind == kind && Some(r.id) != excluding)
            .filter(|r| {
                RoadEnd::BOTH
                    .into_iter()
                    .all(|e| r.end_marker(e).distance(pos) > guard)
            })
            .filter_map(|r| {
                let idx = r.points.nearest_point(pos);
                if idx == 0 || idx + 1 >= r.points.n_points() {
                    return None;
                }
                let d = r.points[idx].distance(pos);
                (d <= self.max_distance).then_some((r.id, idx, d))
            })
            .min_by_key(|&(_, _, d)| OrderedFloat(d))
            .map(|(id, idx, _)| (id, idx))
    }

    /// Junctions take precedence over road ends, which take precedence over mid-spans
    pub fn classify(&self, pos: Vec3, kind: RoadKind, excluding: Option<RoadID>) -> SpatialMatch {
        if let Some(j) = self.nearest_junction(pos, kind) {
            return SpatialMatch::Junction(j);
        }
        if let Some((r, e)) = self.nearest_road_endpoint(pos, kind, excluding) {
            return SpatialMatch::RoadEndpoint(r, e);
        }
        if let Some((r, idx)) = self.nearest_road_midspan(pos, kind, excluding) {
            return SpatialMatch::RoadMidSpan(r, idx);
        }
        SpatialMatch::Free
    }
}
