//! Mathematical utilities and data structures

pub mod aabb;

pub use aabb::Aabb;

/// Hermite smoothstep between `edge0` and `edge1`.
///
/// Degenerates to a hard step at `edge0` when both edges coincide.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
