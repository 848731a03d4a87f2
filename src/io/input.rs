use anyhow::{Context, Result};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{CleanerError, CleanerResult};

/// Structure set as exported from the planning system: ROI definitions and,
/// nested separately, the contours drawn for each ROI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSet {
    pub structure_set_rois: Vec<StructureSetRoi>,
    #[serde(default)]
    pub roi_contours: Vec<RoiContour>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSetRoi {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi_number: Option<i64>,
    pub roi_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiContour {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_roi_number: Option<i64>,
    #[serde(default)]
    pub contours: Vec<ContourItem>,
}

/// One planar contour, stored as flattened (x, y, z) triples in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourItem {
    pub contour_data: Vec<f64>,
}

/// All target points of a structure set in patient coordinates (mm).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContourSet {
    points: Vec<Point3<f64>>,
}

impl ContourSet {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Reads flattened contour data into points. The value count has to be
    /// a multiple of 3.
    pub fn points_from_flat(roi: &str, data: &[f64]) -> CleanerResult<Vec<Point3<f64>>> {
        if data.len() % 3 != 0 {
            return Err(CleanerError::ContourDataLength {
                roi: roi.to_string(),
                len: data.len(),
            });
        }
        Ok(data
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect())
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl StructureSet {
    /// Finds the contour entry belonging to the ROI at `position`. Entries that
    /// name their ROI number are matched by number, otherwise by position.
    fn contours_for(&self, position: usize, roi: &StructureSetRoi) -> Option<&RoiContour> {
        if let Some(number) = roi.roi_number {
            if let Some(found) = self
                .roi_contours
                .iter()
                .find(|c| c.referenced_roi_number == Some(number))
            {
                return Some(found);
            }
        }
        self.roi_contours
            .get(position)
            .filter(|c| c.referenced_roi_number.is_none())
    }
}

/// Collects the points of every ROI whose name contains `pattern`.
///
/// An empty result is valid here; callers decide how to report it.
pub fn load_target_contours(
    structure_set: &StructureSet,
    pattern: &str,
) -> CleanerResult<ContourSet> {
    let mut points = Vec::new();

    for (position, roi) in structure_set.structure_set_rois.iter().enumerate() {
        if !roi.roi_name.contains(pattern) {
            continue;
        }
        let roi_contour = structure_set.contours_for(position, roi).ok_or_else(|| {
            CleanerError::MalformedInput(format!(
                "ROI '{}' has no matching contour sequence",
                roi.roi_name
            ))
        })?;

        let before = points.len();
        for contour in &roi_contour.contours {
            points.extend(ContourSet::points_from_flat(
                &roi.roi_name,
                &contour.contour_data,
            )?);
        }
        tracing::info!(
            "Target ROI '{}': {} contour points",
            roi.roi_name,
            points.len() - before
        );
    }

    Ok(ContourSet::new(points))
}

/// Treatment plan: beams, each with its ordered control points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtPlan {
    pub beams: Vec<Beam>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam_name: Option<String>,
    pub control_points: Vec<ControlPoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Angles are in degrees as stored in the record. Only the first control
/// point of a beam carries isocenter, couch and collimator angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isocenter_position: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gantry_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam_limiting_device_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_support_angle: Option<f64>,
    #[serde(default)]
    pub beam_limiting_device_positions: Vec<DevicePosition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Jaw or MLC positions of one beam limiting device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePosition {
    #[serde(default)]
    pub device_type: String,
    pub leaf_jaw_positions: Vec<f64>,
}

fn read_json<T: serde::de::DeserializeOwned, P: AsRef<Path>>(path: P, what: &str) -> Result<T> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open {} {:?}", what, path))?;
    let record = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {} {:?}", what, path))?;
    Ok(record)
}

pub fn read_structure_set<P: AsRef<Path>>(path: P) -> Result<StructureSet> {
    read_json(path, "structure set")
}

pub fn read_plan<P: AsRef<Path>>(path: P) -> Result<RtPlan> {
    read_json(path, "plan")
}

#[cfg(test)]
mod input_tests {
    use super::*;
    use serde_json::json;

    fn structure_set() -> StructureSet {
        serde_json::from_value(json!({
            "structure_set_rois": [
                {"roi_number": 1, "roi_name": "BODY"},
                {"roi_number": 2, "roi_name": "PTV_70"},
                {"roi_number": 3, "roi_name": "PTV_56"}
            ],
            "roi_contours": [
                {"referenced_roi_number": 1, "contours": [{"contour_data": [9.0, 9.0, 9.0]}]},
                {"referenced_roi_number": 3, "contours": [{"contour_data": [4.0, 5.0, 6.0]}]},
                {"referenced_roi_number": 2, "contours": [
                    {"contour_data": [1.0, 2.0, 3.0, 1.5, 2.5, 3.0]},
                    {"contour_data": [0.0, 0.0, 6.0]}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_only_target_rois_are_loaded() {
        let contours = load_target_contours(&structure_set(), "PTV").unwrap();

        assert_eq!(contours.len(), 4);
        assert_eq!(contours.points()[0], Point3::new(1.0, 2.0, 3.0));
        assert_eq!(contours.points()[2], Point3::new(0.0, 0.0, 6.0));
        assert_eq!(contours.points()[3], Point3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_positional_pairing_without_roi_numbers() {
        let ss: StructureSet = serde_json::from_value(json!({
            "structure_set_rois": [{"roi_name": "Lung"}, {"roi_name": "PTV"}],
            "roi_contours": [
                {"contours": [{"contour_data": [1.0, 1.0, 1.0]}]},
                {"contours": [{"contour_data": [2.0, 2.0, 2.0]}]}
            ]
        }))
        .unwrap();
        let contours = load_target_contours(&ss, "PTV").unwrap();
        assert_eq!(contours.points(), &[Point3::new(2.0, 2.0, 2.0)]);
    }

    #[test]
    fn test_no_target_gives_empty_set() {
        let contours = load_target_contours(&structure_set(), "CTV").unwrap();
        assert!(contours.is_empty());
    }

    #[test]
    fn test_truncated_contour_data_is_rejected() {
        let mut ss = structure_set();
        ss.roi_contours[2].contours[1].contour_data.pop();

        let err = load_target_contours(&ss, "PTV").unwrap_err();
        assert_eq!(
            err,
            CleanerError::ContourDataLength {
                roi: "PTV_70".into(),
                len: 2
            }
        );
    }

    #[test]
    fn test_target_without_contours_is_malformed() {
        let mut ss = structure_set();
        ss.roi_contours.retain(|c| c.referenced_roi_number != Some(3));

        let err = load_target_contours(&ss, "PTV").unwrap_err();
        assert!(matches!(err, CleanerError::MalformedInput(_)));
    }

    #[test]
    fn test_plan_keeps_unknown_fields() {
        let raw = json!({
            "plan_label": "H&N",
            "beams": [{
                "beam_name": "Arc1",
                "treatment_machine_name": "TrueBeam",
                "control_points": [{
                    "gantry_angle": 181.0,
                    "nominal_beam_energy": 6.0,
                    "beam_limiting_device_positions": [
                        {"device_type": "ASYMX", "leaf_jaw_positions": [-50.0, 50.0]}
                    ]
                }]
            }]
        });
        let plan: RtPlan = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(plan.beams[0].control_points[0].gantry_angle, Some(181.0));
        assert_eq!(plan.extra["plan_label"], "H&N");
        assert_eq!(serde_json::to_value(&plan).unwrap(), raw);
    }
}
