//! CSV export of lookup results.

use crate::models::ScoreRecord;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column headers of the exported sheet.
pub const CSV_HEADER: [&str; 7] = [
    "SBD",
    "Họ tên",
    "Toán",
    "Văn",
    "Anh",
    "Tổng điểm",
    "Mã hội đồng",
];

/// File name used when no export path is given.
pub fn default_export_path(date: NaiveDate) -> PathBuf {
    PathBuf::from(format!("ket-qua-tra-cuu-{}.csv", date.format("%Y-%m-%d")))
}

fn score_cell(score: Option<f64>) -> String {
    score.map(|s| s.to_string()).unwrap_or_default()
}

/// Write records as CSV; absent values become empty cells.
pub fn write_csv<W: Write>(records: &[ScoreRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for record in records {
        csv_writer.write_record([
            record.registration_number.clone(),
            record.full_name.clone().unwrap_or_default(),
            score_cell(record.math_score),
            score_cell(record.literature_score),
            score_cell(record.foreign_language_score),
            score_cell(record.total_score),
            record.council_code.clone(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export records to a CSV file.
pub fn export_csv(records: &[ScoreRecord], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    write_csv(records, file)
        .with_context(|| format!("Failed to write CSV file {}", path.display()))
}
