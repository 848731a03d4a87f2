use nalgebra::Point3;
use serde::Deserialize;

use crate::error::{CleanerError, CleanerResult};
use crate::processing::rotation::{rotate_points, Axis};

/// Source-to-axis distance of the treatment machine in mm.
pub const DEFAULT_SAD: f64 = 1000.0;

/// Sign applied to the recorded gantry angle before rotating about z.
///
/// The record stores gantry angles in the IEC 61217 sense: clockwise when
/// viewed from the foot of the couch looking towards the gantry. The z
/// rotation matrix is counterclockwise about +z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GantryConvention {
    /// Rotate by the negated record angle. Carries the patient frame into the
    /// beam frame when +z points towards the gantry (program convention).
    #[default]
    Negated,
    /// Rotate by the record angle unchanged. Matches the IEC sense when the
    /// patient z axis points away from the gantry.
    AsRecorded,
}

impl GantryConvention {
    pub fn apply(self, gantry_rad: f64) -> f64 {
        match self {
            GantryConvention::Negated => -gantry_rad,
            GantryConvention::AsRecorded => gantry_rad,
        }
    }
}

/// Geometry of one control point, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamGeometry {
    pub isocenter: Point3<f64>,
    pub gantry_angle: f64,
    pub collimator_angle: f64,
    pub couch_angle: f64,
}

impl BeamGeometry {
    /// Builds the geometry from record angles in degrees. The gantry sign
    /// convention is applied here, so `gantry_angle` is the rotation that the
    /// pipeline performs.
    pub fn from_degrees(
        isocenter: Point3<f64>,
        gantry_deg: f64,
        collimator_deg: f64,
        couch_deg: f64,
        convention: GantryConvention,
    ) -> Self {
        Self {
            isocenter,
            gantry_angle: convention.apply(gantry_deg.to_radians()),
            collimator_angle: collimator_deg.to_radians(),
            couch_angle: couch_deg.to_radians(),
        }
    }
}

/// Transforms patient coordinates into the beam-eye frame of one control point.
///
/// The steps are applied in this order, which mirrors the machine:
/// 1. subtract the isocenter
/// 2. rotate about y by the couch angle
/// 3. rotate about z by the gantry angle
/// 4. rotate about y (now the beam axis) by the collimator angle
/// 5. project onto the isocenter plane along the diverging rays
///
/// In the output, y is the depth along the central axis, x runs along the
/// leaf travel direction and z across the leaf pairs.
pub fn transform_points(
    points: &[Point3<f64>],
    geometry: &BeamGeometry,
    sad: f64,
) -> CleanerResult<Vec<Point3<f64>>> {
    let iso = geometry.isocenter.coords;
    let centered: Vec<Point3<f64>> = points.iter().map(|p| *p - iso).collect();

    let rotated = rotate_points(&centered, Axis::Y, geometry.couch_angle);
    let rotated = rotate_points(&rotated, Axis::Z, geometry.gantry_angle);
    let rotated = rotate_points(&rotated, Axis::Y, geometry.collimator_angle);

    correct_divergence(rotated, sad)
}

/// Scales the transverse coordinates (x, z) of every point by
/// `sad / (sad + y)`, where y is the depth along the beam axis.
pub fn correct_divergence(
    mut points: Vec<Point3<f64>>,
    sad: f64,
) -> CleanerResult<Vec<Point3<f64>>> {
    for (point_index, p) in points.iter_mut().enumerate() {
        let denominator = sad + p.y;
        if denominator.abs() <= f64::EPSILON * sad.abs().max(1.0) {
            return Err(CleanerError::NumericSingularity {
                point_index,
                depth: p.y,
            });
        }
        let scale = sad / denominator;
        p.x *= scale;
        p.z *= scale;
    }
    Ok(points)
}
