use geom::Vec3;
use serde::{Deserialize, Serialize};

/// Quantizes pointer positions so that visually aligned elements share bit-identical coordinates
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSnapper {
    pub factor: f32,
}

impl GridSnapper {
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }

    /// Rounds x and y to the nearest multiple of the factor, z is left untouched.
    /// A non-positive factor disables snapping.
    #[inline]
    pub fn snap(&self, p: Vec3) -> Vec3 {
        geom::snap_to_grid(p, self.factor)
    }
}

#[cfg(test)]
mod tests {
    use super::GridSnapper;
    use geom::vec3;

    #[test]
    fn snaps_horizontal_only() {
        let s = GridSnapper::new(2.0);
        assert_eq!(s.snap(vec3(2.9, -3.1, 7.3)), vec3(2.0, -4.0, 7.3));
        assert_eq!(s.snap(vec3(0.9, 1.1, 0.0)), vec3(0.0, 2.0, 0.0));
    }

    #[test]
    fn aligned_inputs_become_identical() {
        let s = GridSnapper::new(0.5);
        assert_eq!(s.snap(vec3(10.01, 4.24, 1.0)), s.snap(vec3(9.98, 4.21, 1.0)));
    }

    #[test]
    fn zero_factor_is_identity() {
        let p = vec3(1.234, 5.678, 9.0);
        assert_eq!(GridSnapper::new(0.0).snap(p), p);
    }
}
