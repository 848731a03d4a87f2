pub mod config;
pub mod entry;
pub mod error;
pub mod io;
pub mod processing;
mod utils;

#[cfg(feature = "python")]
mod python_bind;

pub use config::CleanerConfig;
pub use entry::run_leaf_cleaning;
pub use error::{CleanerError, CleanerResult};
pub use io::input::{load_target_contours, ContourSet, RtPlan, StructureSet};
pub use processing::closure::{close_empty_leaves, ClosureOutcome, ClosurePolicy};
pub use processing::control_points::{
    clean_plan, leaf_bank_location, ClosureSummary, LeafBankLocation, LeafBankLookup,
};
pub use processing::mlc::{LeafBank, MlcEdgeTable};
pub use processing::rotation::{rotate_points, rotation_matrix, Axis};
pub use processing::transform::{
    correct_divergence, transform_points, BeamGeometry, GantryConvention,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// This is the module importable from Python:
///
/// ```python
/// import mlc_cleaner as mc
/// mc.clean_plan_file("RS.json", "RP.json", "FixedMLC.json")
/// ```
#[cfg(feature = "python")]
#[pymodule]
fn mlc_cleaner(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(python_bind::clean_plan_file, m)?)?;
    m.add_function(wrap_pyfunction!(python_bind::transform_points_py, m)?)?;
    m.add_function(wrap_pyfunction!(python_bind::mlc_edges, m)?)?;
    m.add_class::<python_bind::PyClosureSummary>()?;
    Ok(())
}
