use super::Vec3;
use serde::{Deserialize, Serialize};

/// Cubic bézier where the inner control points are expressed as derivatives
/// relative to the endpoints
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Spline3 {
    pub from: Vec3,
    pub to: Vec3,
    pub from_derivative: Vec3,
    pub to_derivative: Vec3,
}

impl Default for Spline3 {
    fn default() -> Self {
        Self {
            from: Vec3::ZERO,
            to: Vec3::ZERO,
            from_derivative: Vec3::ZERO,
            to_derivative: Vec3::ZERO,
        }
    }
}

impl Spline3 {
    /// Catmull-Rom segment between p1 and p2, with p0 and p3 as neighbours
    pub fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Self {
        Self {
            from: p1,
            to: p2,
            from_derivative: (p2 - p0) / 6.0,
            to_derivative: (p3 - p1) / 6.0,
        }
    }

    pub fn get(&self, t: f32) -> Vec3 {
        (1.0 - t).powi(3) * self.from
            + 3.0 * t * (1.0 - t).powi(2) * (self.from + self.from_derivative)
            + 3.0 * t.powi(2) * (1.0 - t) * (self.to - self.to_derivative)
            + t.powi(3) * self.to
    }

    pub fn derivative(&self, t: f32) -> Vec3 {
        -3.0 * (t - 1.0).powi(2) * self.from
            + 3.0 * (t - 1.0) * (3.0 * t - 1.0) * (self.from + self.from_derivative)
            + 3.0 * t * (2.0 - 3.0 * t) * (self.to - self.to_derivative)
            + 3.0 * t.powi(2) * self.to
    }

    /// n evenly spaced (in t) points, including both ends
    pub fn points(&self, n: usize) -> impl Iterator<Item = Vec3> + '_ {
        let n = n.max(2);
        (0..n).map(move |i| {
            let c = i as f32 / (n - 1) as f32;

            self.get(c)
        })
    }

    /// Length of the control polygon, an upper bound of the curve length
    pub fn control_length(&self) -> f32 {
        self.from_derivative.mag()
            + ((self.to - self.to_derivative) - (self.from + self.from_derivative)).mag()
            + self.to_derivative.mag()
    }
}

#[cfg(test)]
mod tests {
    use crate::{vec3, Spline3};

    #[test]
    fn test_ends() {
        let s = Spline3 {
            from: vec3(0.0, 0.0, 0.0),
            to: vec3(10.0, 5.0, 1.0),
            from_derivative: vec3(3.0, 0.0, 0.0),
            to_derivative: vec3(0.0, 3.0, 0.0),
        };
        assert!(s.get(0.0).distance(s.from) < 1e-6);
        assert!(s.get(1.0).distance(s.to) < 1e-5);
        let pts: Vec<_> = s.points(5).collect();
        assert_eq!(pts.len(), 5);
        assert!(s.derivative(0.0).distance(s.from_derivative * 3.0) < 1e-5);
    }

    #[test]
    fn test_catmull_rom_straight() {
        let s = Spline3::catmull_rom(
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(2.0, 0.0, 0.0),
            vec3(3.0, 0.0, 0.0),
        );
        for p in s.points(7) {
            assert!(p.y.abs() < 1e-6);
        }
        assert!((s.get(0.5).x - 1.5).abs() < 1e-5);
    }
}
