use nalgebra::Point3;
use serde::Deserialize;

use crate::error::{CleanerError, CleanerResult};
use crate::processing::mlc::{LeafBank, MlcEdgeTable};

/// How a leaf pair without target points is closed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case", deny_unknown_fields)]
pub enum ClosurePolicy {
    /// Close around the midpoint of the current aperture, leaving `gap` mm
    /// between the leaves.
    MidpointGap {
        #[serde(default = "default_gap")]
        gap: f64,
    },
    /// Park both leaves at fixed positions.
    Fixed { bank_a: f64, bank_b: f64 },
}

fn default_gap() -> f64 {
    1.0
}

impl Default for ClosurePolicy {
    fn default() -> Self {
        ClosurePolicy::MidpointGap { gap: default_gap() }
    }
}

impl ClosurePolicy {
    /// Closed (bank A, bank B) positions for an aperture `a..b`.
    pub fn closed_positions(&self, a: f64, b: f64) -> (f64, f64) {
        match *self {
            ClosurePolicy::MidpointGap { gap } => {
                let mid = (a + b) / 2.0;
                (mid - gap / 2.0, mid + gap / 2.0)
            }
            ClosurePolicy::Fixed { bank_a, bank_b } => (bank_a, bank_b),
        }
    }

    pub fn validate(&self) -> CleanerResult<()> {
        match *self {
            ClosurePolicy::MidpointGap { gap } if !(gap.is_finite() && gap >= 0.0) => Err(
                CleanerError::InvalidConfig(format!("closure gap must be >= 0 mm, got {}", gap)),
            ),
            ClosurePolicy::Fixed { bank_a, bank_b } if !(bank_a <= bank_b) => {
                Err(CleanerError::InvalidConfig(format!(
                    "fixed closure has bank A {} beyond bank B {}",
                    bank_a, bank_b
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Result of evaluating one control point.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureOutcome {
    pub leaf_bank: LeafBank,
    /// Indices of the leaf pairs that were closed, ascending.
    pub closed: Vec<usize>,
}

/// Returns true when some point lies inside the open band of `leaf`:
/// strictly between the pair's edges in z and strictly between the two
/// leaf tips in x. `leaf` must be a valid pair index for both tables.
fn pair_sees_target(
    points: &[Point3<f64>],
    edges: &MlcEdgeTable,
    leaf_bank: &LeafBank,
    leaf: usize,
) -> bool {
    let (lower, upper) = edges.band(leaf);
    let (a, b) = (leaf_bank.bank_a[leaf], leaf_bank.bank_b[leaf]);
    points
        .iter()
        .filter(|p| p.z > lower && p.z < upper)
        .any(|p| p.x > a && p.x < b)
}

/// Closes every leaf pair whose open band contains none of the beam-eye
/// `points`. Pairs that see the target keep their positions.
///
/// The input bank is left untouched; the updated bank is returned together
/// with the indices of the closed pairs.
pub fn close_empty_leaves(
    points: &[Point3<f64>],
    edges: &MlcEdgeTable,
    leaf_bank: &LeafBank,
    policy: &ClosurePolicy,
) -> CleanerResult<ClosureOutcome> {
    if edges.leaf_pairs() != leaf_bank.len() {
        return Err(CleanerError::EdgeTableMismatch {
            edges: edges.edges().len(),
            leaves: leaf_bank.len(),
        });
    }
    leaf_bank.validate()?;

    let mut updated = leaf_bank.clone();
    let mut closed = Vec::new();

    for leaf in 0..leaf_bank.len() {
        if pair_sees_target(points, edges, leaf_bank, leaf) {
            continue;
        }
        let (a, b) = policy.closed_positions(leaf_bank.bank_a[leaf], leaf_bank.bank_b[leaf]);
        updated.bank_a[leaf] = a;
        updated.bank_b[leaf] = b;
        closed.push(leaf);
    }

    Ok(ClosureOutcome {
        leaf_bank: updated,
        closed,
    })
}

#[cfg(test)]
mod closure_tests {
    use super::*;
    use crate::utils::test_utils::{open_bank, uniform_bank};
    use approx::assert_relative_eq;

    fn single_band() -> MlcEdgeTable {
        MlcEdgeTable::from_edges(vec![0.0, 5.0]).unwrap()
    }

    #[test]
    fn test_point_inside_band_keeps_pair_open() {
        let bank = LeafBank::new(vec![-2.0], vec![2.0]).unwrap();
        let points = vec![Point3::new(0.0, 0.0, 2.5)];

        let outcome =
            close_empty_leaves(&points, &single_band(), &bank, &ClosurePolicy::default()).unwrap();

        assert!(outcome.closed.is_empty());
        assert_eq!(outcome.leaf_bank, bank);
    }

    #[test]
    fn test_band_edges_are_exclusive() {
        let edges = MlcEdgeTable::from_edges(vec![0.0, 5.0, 10.0]).unwrap();
        let bank = LeafBank::new(vec![-2.0, -2.0], vec![2.0, 2.0]).unwrap();

        // on the shared edge z = 5 and on the leaf tips: no pair sees it
        let on_edges = [
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(-2.0, 0.0, 2.5),
            Point3::new(2.0, 0.0, 7.5),
        ];
        assert!(!pair_sees_target(&on_edges, &edges, &bank, 0));
        assert!(!pair_sees_target(&on_edges, &edges, &bank, 1));

        let inside_second = [Point3::new(1.9, 0.0, 5.1)];
        assert!(!pair_sees_target(&inside_second, &edges, &bank, 0));
        assert!(pair_sees_target(&inside_second, &edges, &bank, 1));
    }

    #[test]
    fn test_empty_point_set_closes_with_midpoint_gap() {
        let bank = LeafBank::new(vec![-2.0], vec![4.0]).unwrap();

        let outcome =
            close_empty_leaves(&[], &single_band(), &bank, &ClosurePolicy::default()).unwrap();

        assert_eq!(outcome.closed, vec![0]);
        assert_relative_eq!(outcome.leaf_bank.bank_a[0], 0.5);
        assert_relative_eq!(outcome.leaf_bank.bank_b[0], 1.5);
    }

    #[test]
    fn test_points_outside_band_close_with_fixed_policy() {
        let bank = LeafBank::new(vec![-2.0], vec![2.0]).unwrap();
        let policy = ClosurePolicy::Fixed {
            bank_a: -0.5,
            bank_b: -0.5,
        };
        let points = vec![
            // outside the band in z
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(0.0, 0.0, -0.1),
            // outside the aperture in x
            Point3::new(2.0, 0.0, 2.5),
            Point3::new(-3.0, 0.0, 2.5),
        ];

        let outcome = close_empty_leaves(&points, &single_band(), &bank, &policy).unwrap();

        assert_eq!(outcome.closed, vec![0]);
        assert_eq!(outcome.leaf_bank.bank_a, vec![-0.5]);
        assert_eq!(outcome.leaf_bank.bank_b, vec![-0.5]);
    }

    #[test]
    fn test_origin_point_keeps_only_central_pair() {
        let edges = MlcEdgeTable::hd120();
        let bank = open_bank(60, 50.0);
        // z = 0 sits on an edge, so shift the target into the pair just above it
        let points = vec![Point3::new(0.0, 0.0, 1.0)];

        let outcome =
            close_empty_leaves(&points, &edges, &bank, &ClosurePolicy::default()).unwrap();

        assert_eq!(outcome.closed.len(), 59);
        assert!(!outcome.closed.contains(&30));
        assert_eq!(outcome.leaf_bank.bank_a[30], -50.0);
        assert_eq!(outcome.leaf_bank.bank_b[30], 50.0);
        assert_relative_eq!(outcome.leaf_bank.bank_a[0], -0.5);
        assert_relative_eq!(outcome.leaf_bank.bank_b[0], 0.5);
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        let edges = MlcEdgeTable::hd120();
        let bank = uniform_bank(60, 10.0, 20.0);
        let points = vec![Point3::new(15.0, 0.0, 1.0), Point3::new(12.0, 5.0, -62.5)];

        for policy in [
            ClosurePolicy::default(),
            ClosurePolicy::Fixed {
                bank_a: 0.0,
                bank_b: 0.0,
            },
        ] {
            let first = close_empty_leaves(&points, &edges, &bank, &policy).unwrap();
            let second = close_empty_leaves(&points, &edges, &first.leaf_bank, &policy).unwrap();
            assert_eq!(first.closed.len(), 58);
            assert_eq!(second.leaf_bank, first.leaf_bank);
        }
    }

    #[test]
    fn test_inverted_pair_is_rejected_before_closing() {
        let bank = LeafBank::new(vec![3.0], vec![-3.0]).unwrap();
        let err =
            close_empty_leaves(&[], &single_band(), &bank, &ClosurePolicy::default()).unwrap_err();
        assert!(matches!(err, CleanerError::InconsistentLeafBank { leaf: 0, .. }));
    }

    #[test]
    fn test_edge_count_must_match_leaf_count() {
        let bank = open_bank(2, 5.0);
        let err =
            close_empty_leaves(&[], &single_band(), &bank, &ClosurePolicy::default()).unwrap_err();
        assert_eq!(err, CleanerError::EdgeTableMismatch { edges: 2, leaves: 2 });
    }

    #[test]
    fn test_policy_validation() {
        assert!(ClosurePolicy::MidpointGap { gap: -1.0 }.validate().is_err());
        assert!(ClosurePolicy::Fixed {
            bank_a: 1.0,
            bank_b: 0.0
        }
        .validate()
        .is_err());
        assert!(ClosurePolicy::default().validate().is_ok());
    }
}
