pub mod closure;
pub mod control_points;
pub mod mlc;
pub mod rotation;
pub mod transform;
