use nalgebra::{Matrix3, Point3};
use std::str::FromStr;

use crate::error::CleanerError;

/// Axis selector for the elementary rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl TryFrom<char> for Axis {
    type Error = CleanerError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'x' | 'X' => Ok(Axis::X),
            'y' | 'Y' => Ok(Axis::Y),
            'z' | 'Z' => Ok(Axis::Z),
            other => Err(CleanerError::UnknownAxis(other.to_string())),
        }
    }
}

impl FromStr for Axis {
    type Err = CleanerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::try_from(c),
            _ => Err(CleanerError::UnknownAxis(trimmed.to_string())),
        }
    }
}

/// Right-handed rotation matrix about `axis` by `theta` radians.
pub fn rotation_matrix(theta: f64, axis: Axis) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    match axis {
        Axis::X => Matrix3::new(
            1.0, 0.0, 0.0,
            0.0, c, -s,
            0.0, s, c,
        ),
        Axis::Y => Matrix3::new(
            c, 0.0, s,
            0.0, 1.0, 0.0,
            -s, 0.0, c,
        ),
        Axis::Z => Matrix3::new(
            c, -s, 0.0,
            s, c, 0.0,
            0.0, 0.0, 1.0,
        ),
    }
}

/// Rotates every point about the origin. Order and count are preserved.
pub fn rotate_points(points: &[Point3<f64>], axis: Axis, angle: f64) -> Vec<Point3<f64>> {
    let r = rotation_matrix(angle, axis);
    points.iter().map(|p| r * *p).collect()
}
