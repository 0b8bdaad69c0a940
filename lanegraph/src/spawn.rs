//! Picking where and what to spawn around a spawn site.
//! Only reads the lanes, the graph is never touched.

use crate::map::{LaneKey, LaneStore, SpawnSite, VehicleCategory};
use crate::utils::rand_provider::RandProvider;
use geom::Vec3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpawnPoint {
    pub lane: LaneKey,
    pub index: usize,
    pub pos: Vec3,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpawnChoice {
    pub category: VehicleCategory,
    pub point: SpawnPoint,
}

/// Every lane point within the site's cylinder, on lanes allowing the category
pub fn eligible_points(
    site: &SpawnSite,
    category: VehicleCategory,
    lanes: &LaneStore,
) -> Vec<SpawnPoint> {
    lanes
        .iter()
        .filter(|l| l.vehicle_types.allows(category))
        .flat_map(|l| {
            l.points
                .iter()
                .enumerate()
                .filter(|(_, p)| {
                    p.horizontal_distance(site.pos) <= site.radius
                        && (p.z - site.pos.z).abs() <= site.height
                })
                .map(move |(index, &pos)| SpawnPoint {
                    lane: l.key,
                    index,
                    pos,
                })
        })
        .collect()
}

/// Uniform draw among the eligible points, None when there are none
pub fn select_spawn_point(
    site: &SpawnSite,
    category: VehicleCategory,
    lanes: &LaneStore,
    rng: &mut RandProvider,
) -> Option<SpawnPoint> {
    let mut points = eligible_points(site, category, lanes);
    if points.is_empty() {
        return None;
    }
    // lane store iteration order is not stable across rebuilds
    points.sort_by_key(|p| (p.lane, p.index));
    Some(points[rng.next_index(points.len())])
}

/// Cumulative weight draw over the site's table.
/// Entries with a zero, negative or non finite weight are never picked.
pub fn select_category(site: &SpawnSite, rng: &mut RandProvider) -> Option<VehicleCategory> {
    let valid = || {
        site.table
            .iter()
            .filter(|e| e.weight.is_finite() && e.weight > 0.0)
    };
    let total: f32 = valid().map(|e| e.weight).sum();
    if total <= 0.0 {
        return None;
    }

    let r = rng.next_f32() * total;
    let mut cum = 0.0;
    let mut last = None;
    for e in valid() {
        cum += e.weight;
        last = Some(e.category);
        if r < cum {
            return last;
        }
    }
    // float rounding left r right at the total
    last
}

pub fn spawn(site: &SpawnSite, lanes: &LaneStore, rng: &mut RandProvider) -> Option<SpawnChoice> {
    let category = select_category(site, rng)?;
    let point = select_spawn_point(site, category, lanes, rng)?;
    Some(SpawnChoice { category, point })
}
