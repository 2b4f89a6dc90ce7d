pub mod mat4;
pub mod vec;

pub use mat4::*;
pub use vec::*;

pub fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}
