use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::CleanerConfig;
use crate::io::input::{load_target_contours, read_plan, read_structure_set};
use crate::io::output::{write_closure_report, write_plan};
use crate::processing::control_points::{clean_plan, ClosureSummary};

/// Reads a structure set and a plan, closes every MLC leaf pair that does not
/// see the target and writes the updated plan to `output_path`.
///
/// Nothing is written unless every control point of every beam was processed.
/// The optional report lists the closed leaf pairs per control point.
pub fn run_leaf_cleaning<P: AsRef<Path>>(
    structure_set_path: P,
    plan_path: P,
    output_path: P,
    report_path: Option<P>,
    config: &CleanerConfig,
) -> Result<Vec<ClosureSummary>> {
    let structure_set = read_structure_set(&structure_set_path)?;
    let plan = read_plan(&plan_path)?;

    let contours = load_target_contours(&structure_set, &config.target_roi_pattern)
        .with_context(|| {
            format!(
                "failed to load target contours from {:?}",
                structure_set_path.as_ref()
            )
        })?;
    tracing::info!(
        "Loaded {} target points from {:?}",
        contours.len(),
        structure_set_path.as_ref()
    );

    let (cleaned, summaries) = clean_plan(&plan, &contours, config)
        .with_context(|| format!("failed to clean plan {:?}", plan_path.as_ref()))?;

    // Stage every output first so a failed write leaves nothing behind.
    let output_path = output_path.as_ref();
    let mut staged = vec![(staging_path(output_path), output_path.to_path_buf())];
    let written = write_plan(&staged[0].0, &cleaned).and_then(|()| match &report_path {
        Some(report_path) => {
            let report_path = report_path.as_ref();
            staged.push((staging_path(report_path), report_path.to_path_buf()));
            write_closure_report(&staged[1].0, &summaries)
        }
        None => Ok(()),
    });
    if let Err(e) = written {
        for (partial, _) in &staged {
            std::fs::remove_file(partial).ok();
        }
        return Err(e);
    }

    for (partial, target) in &staged {
        std::fs::rename(partial, target)
            .with_context(|| format!("failed to move {:?} to {:?}", partial, target))?;
        tracing::info!("Wrote {:?}", target);
    }

    Ok(summaries)
}

/// Sibling of `path` used while the file is being written.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
