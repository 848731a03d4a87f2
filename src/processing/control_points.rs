use nalgebra::Point3;
use rayon::prelude::*;
use serde::Deserialize;

use crate::config::CleanerConfig;
use crate::error::{CleanerError, CleanerResult};
use crate::io::input::{Beam, ContourSet, RtPlan};
use crate::processing::closure::{close_empty_leaves, ClosureOutcome};
use crate::processing::mlc::{LeafBank, MlcEdgeTable};
use crate::processing::transform::{transform_points, BeamGeometry, GantryConvention};

/// Where the MLC positions sit inside a control point's device sequence.
///
/// Exported plans store the first control point of a beam with all devices
/// (jaws first, MLC last) and later control points with the MLC alone, so the
/// slot differs between the two.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "lookup", rename_all = "snake_case", deny_unknown_fields)]
pub enum LeafBankLookup {
    FixedSlots {
        #[serde(default = "default_first_slot")]
        first_control_point: usize,
        #[serde(default)]
        subsequent_control_points: usize,
    },
    /// First device whose type matches, e.g. "MLCX".
    DeviceType { device_type: String },
}

fn default_first_slot() -> usize {
    2
}

impl Default for LeafBankLookup {
    fn default() -> Self {
        LeafBankLookup::FixedSlots {
            first_control_point: default_first_slot(),
            subsequent_control_points: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafBankLocation {
    pub beam: usize,
    pub control_point: usize,
    pub device: usize,
}

/// Resolves the device slot holding the leaf positions of one control point.
pub fn leaf_bank_location(
    beam: &Beam,
    beam_index: usize,
    control_point_index: usize,
    lookup: &LeafBankLookup,
) -> CleanerResult<LeafBankLocation> {
    let cp = beam.control_points.get(control_point_index).ok_or_else(|| {
        CleanerError::MalformedInput(format!(
            "beam has no control point {}",
            control_point_index
        ))
    })?;
    let devices = &cp.beam_limiting_device_positions;

    let device = match lookup {
        LeafBankLookup::FixedSlots {
            first_control_point,
            subsequent_control_points,
        } => {
            let slot = if control_point_index == 0 {
                *first_control_point
            } else {
                *subsequent_control_points
            };
            if slot >= devices.len() {
                return Err(CleanerError::MalformedInput(format!(
                    "expected leaf positions in device slot {}, but only {} devices are present",
                    slot,
                    devices.len()
                )));
            }
            slot
        }
        LeafBankLookup::DeviceType { device_type } => devices
            .iter()
            .position(|d| &d.device_type == device_type)
            .ok_or_else(|| {
                CleanerError::MalformedInput(format!("no '{}' device positions", device_type))
            })?,
    };

    Ok(LeafBankLocation {
        beam: beam_index,
        control_point: control_point_index,
        device,
    })
}

/// Geometry of every control point of a beam.
///
/// Isocenter, couch and collimator angle come from the first control point.
/// A control point without a gantry angle keeps the previous one.
pub fn beam_geometries(
    beam: &Beam,
    convention: GantryConvention,
) -> CleanerResult<Vec<BeamGeometry>> {
    let first = beam
        .control_points
        .first()
        .ok_or_else(|| CleanerError::MalformedInput("beam has no control points".into()))?;

    let missing = |field: &str| {
        CleanerError::MalformedInput(format!("first control point has no {}", field))
    };
    let iso = first
        .isocenter_position
        .ok_or_else(|| missing("isocenter position"))?;
    let couch = first
        .patient_support_angle
        .ok_or_else(|| missing("patient support angle"))?;
    let collimator = first
        .beam_limiting_device_angle
        .ok_or_else(|| missing("beam limiting device angle"))?;
    let isocenter = Point3::new(iso[0], iso[1], iso[2]);

    let mut gantry = first.gantry_angle.ok_or_else(|| missing("gantry angle"))?;
    let mut geometries = Vec::with_capacity(beam.control_points.len());
    for cp in &beam.control_points {
        if let Some(angle) = cp.gantry_angle {
            gantry = angle;
        }
        geometries.push(BeamGeometry::from_degrees(
            isocenter, gantry, collimator, couch, convention,
        ));
    }
    Ok(geometries)
}

/// Per control point record of what was closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureSummary {
    pub beam_index: usize,
    pub beam_name: String,
    pub control_point: usize,
    pub gantry_angle_deg: f64,
    pub closed: Vec<usize>,
}

struct Job {
    location: LeafBankLocation,
    geometry: BeamGeometry,
    gantry_angle_deg: f64,
    leaf_bank: LeafBank,
}

fn collect_jobs(plan: &RtPlan, config: &CleanerConfig) -> CleanerResult<Vec<Job>> {
    let mut jobs = Vec::new();
    for (beam_index, beam) in plan.beams.iter().enumerate() {
        let geometries = beam_geometries(beam, config.gantry_convention)
            .map_err(|e| e.at(beam_index, 0))?;

        let mut gantry_deg = 0.0;
        for (cp_index, geometry) in geometries.into_iter().enumerate() {
            let at = |e: CleanerError| e.at(beam_index, cp_index);
            let location =
                leaf_bank_location(beam, beam_index, cp_index, &config.leaf_bank).map_err(at)?;
            let cp = &beam.control_points[cp_index];
            if let Some(angle) = cp.gantry_angle {
                gantry_deg = angle;
            }
            let positions = &cp.beam_limiting_device_positions[location.device].leaf_jaw_positions;
            let leaf_bank = LeafBank::from_positions(positions).map_err(at)?;

            jobs.push(Job {
                location,
                geometry,
                gantry_angle_deg: gantry_deg,
                leaf_bank,
            });
        }
    }
    Ok(jobs)
}

fn evaluate(
    job: &Job,
    contours: &ContourSet,
    edges: &MlcEdgeTable,
    config: &CleanerConfig,
) -> CleanerResult<ClosureOutcome> {
    let at = |e: CleanerError| e.at(job.location.beam, job.location.control_point);
    let points =
        transform_points(contours.points(), &job.geometry, config.source_axis_distance)
            .map_err(at)?;
    close_empty_leaves(&points, edges, &job.leaf_bank, &config.closure).map_err(at)
}

/// Runs the leaf cleaning over the 60 pair high-definition MLC.
pub fn clean_plan(
    plan: &RtPlan,
    contours: &ContourSet,
    config: &CleanerConfig,
) -> CleanerResult<(RtPlan, Vec<ClosureSummary>)> {
    clean_plan_with_edges(plan, contours, &MlcEdgeTable::hd120(), config)
}

/// Closes every leaf pair that does not see the target, for every control
/// point of every beam.
///
/// The input plan is not modified. Either every control point succeeds and
/// the updated copy is returned, or the first error is.
pub fn clean_plan_with_edges(
    plan: &RtPlan,
    contours: &ContourSet,
    edges: &MlcEdgeTable,
    config: &CleanerConfig,
) -> CleanerResult<(RtPlan, Vec<ClosureSummary>)> {
    config.validate()?;
    if contours.is_empty() {
        tracing::warn!(
            "No contour points found for ROIs matching '{}'; every leaf pair will be closed",
            config.target_roi_pattern
        );
    }

    let jobs = collect_jobs(plan, config)?;
    tracing::info!(
        "Evaluating {} control points across {} beams against {} target points",
        jobs.len(),
        plan.beams.len(),
        contours.len()
    );

    let outcomes: Vec<ClosureOutcome> = if config.parallel {
        jobs.par_iter()
            .map(|job| evaluate(job, contours, edges, config))
            .collect::<CleanerResult<_>>()?
    } else {
        jobs.iter()
            .map(|job| evaluate(job, contours, edges, config))
            .collect::<CleanerResult<_>>()?
    };

    let mut cleaned = plan.clone();
    let mut summaries = Vec::with_capacity(jobs.len());
    for (job, outcome) in jobs.iter().zip(outcomes) {
        let loc = job.location;
        let beam = &mut cleaned.beams[loc.beam];
        beam.control_points[loc.control_point].beam_limiting_device_positions[loc.device]
            .leaf_jaw_positions = outcome.leaf_bank.to_positions();

        tracing::debug!(
            "Beam {} control point {}: closed {} of {} leaf pairs",
            loc.beam,
            loc.control_point,
            outcome.closed.len(),
            job.leaf_bank.len()
        );
        summaries.push(ClosureSummary {
            beam_index: loc.beam,
            beam_name: beam.beam_name.clone().unwrap_or_default(),
            control_point: loc.control_point,
            gantry_angle_deg: job.gantry_angle_deg,
            closed: outcome.closed,
        });
    }

    Ok((cleaned, summaries))
}
