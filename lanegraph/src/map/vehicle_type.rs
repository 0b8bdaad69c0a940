use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Set of vehicle categories allowed on a lane
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct VehicleTypeMask: u8 {
        const LIGHT      = 1;
        const MEDIUM     = 1 << 1;
        const HEAVY      = 1 << 2;
        const TAXI       = 1 << 3;
        const BUS        = 1 << 4;
        const PEDESTRIAN = 1 << 5;

        const VEHICLES = Self::LIGHT.bits()
            | Self::MEDIUM.bits()
            | Self::HEAVY.bits()
            | Self::TAXI.bits()
            | Self::BUS.bits();
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VehicleCategory {
    Light,
    Medium,
    Heavy,
    Taxi,
    Bus,
    Pedestrian,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 6] = [
        VehicleCategory::Light,
        VehicleCategory::Medium,
        VehicleCategory::Heavy,
        VehicleCategory::Taxi,
        VehicleCategory::Bus,
        VehicleCategory::Pedestrian,
    ];

    #[inline]
    pub const fn mask(self) -> VehicleTypeMask {
        match self {
            VehicleCategory::Light => VehicleTypeMask::LIGHT,
            VehicleCategory::Medium => VehicleTypeMask::MEDIUM,
            VehicleCategory::Heavy => VehicleTypeMask::HEAVY,
            VehicleCategory::Taxi => VehicleTypeMask::TAXI,
            VehicleCategory::Bus => VehicleTypeMask::BUS,
            VehicleCategory::Pedestrian => VehicleTypeMask::PEDESTRIAN,
        }
    }
}

impl VehicleTypeMask {
    /// A vehicle may use a lane only if its category is a member of the mask
    #[inline]
    pub fn allows(self, category: VehicleCategory) -> bool {
        self.contains(category.mask())
    }
}

impl FromIterator<VehicleCategory> for VehicleTypeMask {
    fn from_iter<T: IntoIterator<Item = VehicleCategory>>(iter: T) -> Self {
        iter.into_iter()
            .fold(VehicleTypeMask::empty(), |acc, c| acc | c.mask())
    }
}

#[cfg(test)]
mod tests {
    use super::{VehicleCategory, VehicleTypeMask};

    #[test]
    fn union_of_categories() {
        let m: VehicleTypeMask = [VehicleCategory::Light, VehicleCategory::Bus]
            .into_iter()
            .collect();
        assert!(m.allows(VehicleCategory::Light));
        assert!(m.allows(VehicleCategory::Bus));
        assert!(!m.allows(VehicleCategory::Pedestrian));
        assert!(VehicleTypeMask::VEHICLES.contains(m));
        assert!(!VehicleTypeMask::VEHICLES.allows(VehicleCategory::Pedestrian));
    }
}
