use crate::map::VehicleCategory;
use geom::Vec3;
use serde::{Deserialize, Serialize};
use slotmapd::new_key_type;

new_key_type! {
    pub struct SpawnSiteID;
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnEntry {
    pub category: VehicleCategory,
    pub weight: f32,
}

/// Parameters shared by every spawn site placed with the same tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnTemplate {
    pub height: f32,
    pub interval: f32,
    pub table: Vec<SpawnEntry>,
}

impl Default for SpawnTemplate {
    fn default() -> Self {
        Self {
            height: 2.0,
            interval: 1.0,
            table: vec![SpawnEntry {
                category: VehicleCategory::Light,
                weight: 1.0,
            }],
        }
    }
}

/// Region where new agents are introduced on the lane graph.
/// It only reads lane points when queried.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpawnSite {
    pub id: SpawnSiteID,
    pub pos: Vec3,
    /// Maximum horizontal distance to an eligible lane point
    pub radius: f32,
    /// Maximum vertical distance to an eligible lane point
    pub height: f32,
    pub table: Vec<SpawnEntry>,

    /// Seconds between two spawns
    pub interval: f32,
    pub active: bool,
    elapsed: f32,
}

impl SpawnSite {
    pub fn new(id: SpawnSiteID, pos: Vec3, radius: f32, template: &SpawnTemplate) -> Self {
        Self {
            id,
            pos,
            radius,
            height: template.height,
            table: template.table.clone(),
            interval: template.interval,
            active: false,
            elapsed: 0.0,
        }
    }

    pub fn start(&mut self) {
        self.active = true;
        self.elapsed = 0.0;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Advances the timer, returns true when a spawn is due
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.active {
            return false;
        }
        self.elapsed += dt;
        if self.elapsed >= self.interval {
            self.elapsed = 0.0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{SpawnSite, SpawnTemplate};
    use crate::map::SpawnSites;
    use geom::Vec3;

    #[test]
    fn tick_only_when_active() {
        let mut sites = SpawnSites::default();
        let id = sites
            .insert_with_key(|id| SpawnSite::new(id, Vec3::ZERO, 5.0, &SpawnTemplate::default()));
        let s = &mut sites[id];

        assert!(!s.tick(10.0));
        s.start();
        assert!(!s.tick(0.5));
        assert!(s.tick(0.5));
        assert!(!s.tick(0.1));
        s.stop();
        assert!(!s.tick(5.0));
    }
}
