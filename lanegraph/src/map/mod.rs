use slotmapd::HopSlotMap;

mod objects {
    mod connector;
    mod junction;
    mod lane;
    mod road;
    mod spawn_site;
    mod traffic_light;

    pub use connector::*;
    pub use junction::*;
    pub use lane::*;
    pub use road::*;
    pub use spawn_site::*;
    pub use traffic_light::*;
}

pub use objects::*;

mod error;
mod geometry;
mod graph;
mod snap;
mod spatial;
mod synthesis;
mod turn_policy;
mod vehicle_type;
mod wiring;

pub use error::*;
pub use geometry::*;
pub use graph::*;
pub use snap::*;
pub use spatial::*;
pub use synthesis::*;
pub use turn_policy::*;
pub use vehicle_type::*;
pub use wiring::*;

pub type Roads = HopSlotMap<RoadID, Road>;
pub type Junctions = HopSlotMap<JunctionID, Junction>;
pub type SpawnSites = HopSlotMap<SpawnSiteID, SpawnSite>;
pub type TrafficLights = HopSlotMap<TrafficLightID, TrafficLight>;

pub const CROSSWALK_WIDTH: f32 = 2.0;
