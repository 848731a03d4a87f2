use thiserror::Error;

/// Errors raised by the leaf cleaning core.
///
/// All of these abort the run; no partially updated plan is ever written.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CleanerError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("contour data of ROI '{roi}' has {len} values, which is not a multiple of 3")]
    ContourDataLength { roi: String, len: usize },

    #[error(
        "point {point_index} lies at depth {depth} mm, on the source plane (SAD + depth = 0)"
    )]
    NumericSingularity { point_index: usize, depth: f64 },

    #[error("leaf pair {leaf} is inverted: bank A {bank_a} > bank B {bank_b}")]
    InconsistentLeafBank { leaf: usize, bank_a: f64, bank_b: f64 },

    #[error("unknown rotation axis '{0}', expected one of x, y, z")]
    UnknownAxis(String),

    #[error("edge table has {edges} edges but the leaf bank has {leaves} leaf pairs")]
    EdgeTableMismatch { edges: usize, leaves: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("beam {beam}, control point {control_point}: {source}")]
    AtControlPoint {
        beam: usize,
        control_point: usize,
        #[source]
        source: Box<CleanerError>,
    },
}

impl CleanerError {
    /// Tags the error with the control point it was raised for.
    pub fn at(self, beam: usize, control_point: usize) -> Self {
        CleanerError::AtControlPoint {
            beam,
            control_point,
            source: Box::new(self),
        }
    }

    /// The underlying error, with control point tags removed.
    pub fn root(&self) -> &CleanerError {
        match self {
            CleanerError::AtControlPoint { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type CleanerResult<T> = Result<T, CleanerError>;
