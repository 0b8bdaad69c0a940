use crate::map::{JunctionMatch, RoadKind, RoadType, VehicleTypeMask};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tolerances and presets used by the topology engine.
/// Owned by the `TopologyGraph`, there is no global config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Grid step input positions are rounded to
    pub snap_factor: f32,
    /// Max distance for junction, endpoint and mid-span matches
    pub match_distance: f32,
    /// Lane points closer than this to the simplified line are dropped
    pub decimation_tolerance: f32,
    /// Max distance between a connector path end and the lane point it resolves to
    pub connector_distance: f32,
    /// Roads shorter than this are discarded on commit
    pub min_road_length: f32,
    /// Max distance between two centerline points
    pub spline_step: f32,
    /// Number of interior points of a connector path
    pub turn_detail: usize,
    pub right_hand_driving: bool,
    /// Generate U-turn connectors
    pub back_turns: bool,
    pub junction_match: JunctionMatch,
    pub crossing_radius: f32,
    pub corner_radius: f32,
    pub crosswalks: bool,

    pub road_types: Vec<RoadType>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snap_factor: 2.0,
            match_distance: 3.0,
            decimation_tolerance: 0.4,
            connector_distance: 1.0,
            min_road_length: 1.0,
            spline_step: 1.0,
            turn_detail: 8,
            right_hand_driving: true,
            back_turns: false,
            junction_match: JunctionMatch::Nearest,
            crossing_radius: 6.0,
            corner_radius: 4.0,
            crosswalks: true,
            road_types: vec![
                RoadType::new("2Lane-2Way", RoadKind::Road, 6.0, 1, 1, VehicleTypeMask::VEHICLES),
                RoadType::new("4Lane-2Way", RoadKind::Road, 12.0, 2, 2, VehicleTypeMask::VEHICLES),
                RoadType::new("2Lane-1Way", RoadKind::Road, 6.0, 2, 0, VehicleTypeMask::VEHICLES),
                RoadType::new(
                    "Footpath",
                    RoadKind::Footpath,
                    2.0,
                    1,
                    1,
                    VehicleTypeMask::PEDESTRIAN,
                ),
            ],
        }
    }
}

impl Config {
    /// Loads the config, falling back to the default when the file is missing or invalid
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no config at {}, using default", path.display());
            return Self::default();
        }
        common::saveload::load_json(path).unwrap_or_else(|| {
            log::error!("couldn't read config at {}, using default", path.display());
            Self::default()
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) {
        let _ = common::saveload::save_json(self, path);
    }

    pub fn road_type(&self, name: &str) -> Option<&RoadType> {
        self.road_types.iter().find(|t| t.name == name)
    }
}
