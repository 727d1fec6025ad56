use crate::domain::model::ImportReport;
use crate::utils::error::Result;
use chrono::Local;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Rejected notes of `report`, each with its 1-based position and the reason.
pub fn rejected_notes(report: &ImportReport) -> Vec<Value> {
    report
        .failures
        .iter()
        .map(|(index, error)| {
            json!({
                "index": index + 1,
                "error": error.to_string(),
                "note": report.notes.get(*index),
            })
        })
        .collect()
}

/// Writes the rejected notes to `<dir>/rejected-<timestamp>.json`.
/// Nothing is written for a clean report.
pub fn write_rejected(dir: &Path, report: &ImportReport) -> Result<Option<PathBuf>> {
    if report.is_clean() {
        return Ok(None);
    }

    fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "rejected-{}.json",
        Local::now().format("%Y%m%d-%H%M%S%.3f")
    ));
    fs::write(&path, serde_json::to_vec_pretty(&rejected_notes(report))?)?;
    Ok(Some(path))
}
