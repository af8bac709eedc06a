//! Flat-text export of persisted records.
//!
//! A human-readable mirror written next to the database, one file per job.
//! This is a side output: the pipeline never reads it back.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::ExtractedRecord;

/// Write `records` to `<dir>/job-<job_id>.txt`, returning the path.
pub fn export_records(
    dir: &Path,
    job_id: &str,
    records: &[ExtractedRecord],
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("job-{job_id}.txt"));
    let mut file = std::fs::File::create(&path)?;

    for record in records {
        writeln!(file, "{}", record.body_content)?;
        writeln!(file)?;
    }

    Ok(path)
}
