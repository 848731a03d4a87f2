use anyhow::Context;
use csv::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::io::input::RtPlan;
use crate::processing::control_points::ClosureSummary;

/// Writes the plan as pretty printed JSON, creating parent directories.
pub fn write_plan<P: AsRef<Path>>(path: P, plan: &RtPlan) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, plan)
        .with_context(|| format!("failed to serialize plan to {:?}", path))?;
    writer.flush()?;
    Ok(())
}

/// One row per control point: which leaf pairs were closed.
pub fn write_closure_report<P: AsRef<Path>>(
    path: P,
    summaries: &[ClosureSummary],
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut wtr =
        Writer::from_path(path).with_context(|| format!("failed to create report {:?}", path))?;

    wtr.write_record([
        "beam_index",
        "beam_name",
        "control_point",
        "gantry_angle_deg",
        "closed_count",
        "closed_leaves",
    ])?;

    for summary in summaries {
        let closed_leaves = summary
            .closed
            .iter()
            .map(|leaf| leaf.to_string())
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record(&[
            summary.beam_index.to_string(),
            summary.beam_name.clone(),
            summary.control_point.to_string(),
            summary.gantry_angle_deg.to_string(),
            summary.closed.len().to_string(),
            closed_leaves,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
