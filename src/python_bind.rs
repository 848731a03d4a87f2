// File: src/python_bind.rs
use nalgebra::Point3;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::CleanerConfig;
use crate::entry::run_leaf_cleaning;
use crate::processing::control_points::ClosureSummary;
use crate::processing::mlc::MlcEdgeTable;
use crate::processing::transform::{transform_points, BeamGeometry};

#[pyclass]
#[derive(Debug, Clone)]
pub struct PyClosureSummary {
    #[pyo3(get)]
    pub beam_index: usize,
    #[pyo3(get)]
    pub beam_name: String,
    #[pyo3(get)]
    pub control_point: usize,
    #[pyo3(get)]
    pub gantry_angle_deg: f64,
    #[pyo3(get)]
    pub closed: Vec<usize>,
}

#[pymethods]
impl PyClosureSummary {
    fn __repr__(&self) -> String {
        format!(
            "ClosureSummary(beam={} '{}', cp={}, gantry={:.1}, closed={})",
            self.beam_index,
            self.beam_name,
            self.control_point,
            self.gantry_angle_deg,
            self.closed.len()
        )
    }
}

impl From<ClosureSummary> for PyClosureSummary {
    fn from(s: ClosureSummary) -> Self {
        Self {
            beam_index: s.beam_index,
            beam_name: s.beam_name,
            control_point: s.control_point,
            gantry_angle_deg: s.gantry_angle_deg,
            closed: s.closed,
        }
    }
}

/// Cleans the MLC sequence of a plan file. See `run_leaf_cleaning`.
#[pyfunction]
#[pyo3(signature = (structure_set_path, plan_path, output_path, report_path = None, config_path = None))]
pub fn clean_plan_file(
    structure_set_path: &str,
    plan_path: &str,
    output_path: &str,
    report_path: Option<&str>,
    config_path: Option<&str>,
) -> PyResult<Vec<PyClosureSummary>> {
    let config = match config_path {
        Some(path) => CleanerConfig::from_file(path)
            .map_err(|e| PyValueError::new_err(format!("{:#}", e)))?,
        None => CleanerConfig::default(),
    };

    let summaries = run_leaf_cleaning(
        structure_set_path,
        plan_path,
        output_path,
        report_path,
        &config,
    )
    .map_err(|e| pyo3::exceptions::PyRuntimeError::new_err(format!("{:#}", e)))?;

    Ok(summaries.into_iter().map(PyClosureSummary::from).collect())
}

/// Beam-eye coordinates of `points` for one control point. Angles in
/// radians, applied as given.
#[pyfunction]
#[pyo3(name = "transform_points", signature = (points, isocenter, gantry_angle, collimator_angle, couch_angle, sad = 1000.0))]
pub fn transform_points_py(
    points: Vec<(f64, f64, f64)>,
    isocenter: (f64, f64, f64),
    gantry_angle: f64,
    collimator_angle: f64,
    couch_angle: f64,
    sad: f64,
) -> PyResult<Vec<(f64, f64, f64)>> {
    let points: Vec<Point3<f64>> = points
        .into_iter()
        .map(|(x, y, z)| Point3::new(x, y, z))
        .collect();
    let geometry = BeamGeometry {
        isocenter: Point3::new(isocenter.0, isocenter.1, isocenter.2),
        gantry_angle,
        collimator_angle,
        couch_angle,
    };
    let transformed = transform_points(&points, &geometry, sad)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(transformed.iter().map(|p| (p.x, p.y, p.z)).collect())
}

/// Leaf pair boundaries of the 60 pair high-definition MLC in mm.
#[pyfunction]
pub fn mlc_edges() -> Vec<f64> {
    MlcEdgeTable::hd120().edges().to_vec()
}
