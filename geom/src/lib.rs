mod polyline3;
mod spline3;
mod v2;
mod v3;

pub use polyline3::*;
pub use spline3::*;
pub use v2::*;
pub use v3::*;

/// Rounds x and y to the nearest multiple of `factor`, z is untouched
pub fn snap_to_grid(p: Vec3, factor: f32) -> Vec3 {
    if factor <= 0.0 {
        return p;
    }
    vec3(
        (p.x / factor).round() * factor,
        (p.y / factor).round() * factor,
        p.z,
    )
}
