use serde_json::Map;

use crate::io::input::{Beam, ControlPoint, DevicePosition, RtPlan};
use crate::processing::mlc::LeafBank;

/// Leaf bank with every pair open from -half_width to +half_width.
pub fn open_bank(leaves: usize, half_width: f64) -> LeafBank {
    uniform_bank(leaves, -half_width, half_width)
}

/// Leaf bank with every pair at the same aperture.
pub fn uniform_bank(leaves: usize, bank_a: f64, bank_b: f64) -> LeafBank {
    LeafBank {
        bank_a: vec![bank_a; leaves],
        bank_b: vec![bank_b; leaves],
    }
}

/// Record leaf positions for an open bank: bank A followed by bank B.
pub fn open_positions(leaves: usize, half_width: f64) -> Vec<f64> {
    open_bank(leaves, half_width).to_positions()
}

fn device(device_type: &str, positions: Vec<f64>) -> DevicePosition {
    DevicePosition {
        device_type: device_type.to_string(),
        leaf_jaw_positions: positions,
    }
}

/// Beam at isocenter (0, 0, 0) with couch and collimator at 0 and one
/// control point per gantry angle. The first control point carries the
/// jaws and the MLC in slot 2, later ones only the MLC.
pub fn make_beam(name: &str, gantry_angles: &[f64], leaves: usize, half_width: f64) -> Beam {
    let control_points = gantry_angles
        .iter()
        .enumerate()
        .map(|(i, &gantry)| {
            if i == 0 {
                ControlPoint {
                    isocenter_position: Some([0.0, 0.0, 0.0]),
                    gantry_angle: Some(gantry),
                    beam_limiting_device_angle: Some(0.0),
                    patient_support_angle: Some(0.0),
                    beam_limiting_device_positions: vec![
                        device("ASYMX", vec![-100.0, 100.0]),
                        device("ASYMY", vec![-100.0, 100.0]),
                        device("MLCX", open_positions(leaves, half_width)),
                    ],
                    extra: Map::new(),
                }
            } else {
                ControlPoint {
                    isocenter_position: None,
                    gantry_angle: Some(gantry),
                    beam_limiting_device_angle: None,
                    patient_support_angle: None,
                    beam_limiting_device_positions: vec![device(
                        "MLCX",
                        open_positions(leaves, half_width),
                    )],
                    extra: Map::new(),
                }
            }
        })
        .collect();

    Beam {
        beam_number: None,
        beam_name: Some(name.to_string()),
        control_points,
        extra: Map::new(),
    }
}

pub fn make_plan(beams: Vec<Beam>) -> RtPlan {
    RtPlan {
        beams,
        extra: Map::new(),
    }
}
