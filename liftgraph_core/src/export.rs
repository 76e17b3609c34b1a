//! CSV export of completed workout sets.
//!
//! One row per set, appended to the target file. Headers are written only
//! when the file is new, and the file is fsynced before returning.

use crate::types::WorkoutRecord;
use crate::Result;
use std::fs::OpenOptions;
use std::path::Path;

#[derive(Debug, serde::Serialize)]
struct SetRow<'a> {
    workout_id: &'a str,
    workout_title: &'a str,
    workout_type: &'static str,
    started_at: String,
    exercise: String,
    set_number: u32,
    set_type: &'static str,
    weight: f64,
    reps: u32,
    rpe: Option<f64>,
    completed_at: Option<String>,
    volume: f64,
}

/// Append every set of `records` to the CSV at `csv_path`.
///
/// Returns the number of rows written.
pub fn workout_sets_to_csv(records: &[WorkoutRecord], csv_path: &Path) -> Result<usize> {
    let rows: Vec<SetRow<'_>> = records
        .iter()
        .flat_map(|record| {
            record.sets.iter().map(move |set| SetRow {
                workout_id: &record.id,
                workout_title: &record.title,
                workout_type: record.workout_type.as_str(),
                started_at: record.started_at.to_rfc3339(),
                exercise: set.exercise.to_string(),
                set_number: set.set_number,
                set_type: set.set_type.as_str(),
                weight: set.weight,
                reps: set.reps,
                rpe: set.rpe,
                completed_at: set.completed_at.map(|t| t.to_rfc3339()),
                volume: set.weight * f64::from(set.reps),
            })
        })
        .collect();

    if rows.is_empty() {
        tracing::info!("No workout sets to export");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);
    for row in &rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!(
        "Exported {} sets from {} workouts to {:?}",
        rows.len(),
        records.len(),
        csv_path
    );
    Ok(rows.len())
}
