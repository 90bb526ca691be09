//! Result-table export: CSV and JSON.
//!
//! CSV columns: date, contract, identity, then the twelve numeric fields in
//! printed order (snake_case names). Volumes print as integers, amounts with
//! no trailing fraction when whole.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use taifex_core::domain::{FieldKey, ResultTable};

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the table as CSV, sorted for presentation.
pub fn export_csv(table: &ResultTable) -> Result<String> {
    let mut sorted = table.clone();
    sorted.sort_for_presentation();

    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date", "contract", "identity"];
    header.extend(FieldKey::ALL.iter().map(|k| k.column_name()));
    wtr.write_record(&header)?;

    for r in &sorted {
        let mut row = vec![
            r.date.to_string(),
            r.contract.code().to_string(),
            r.identity_label.clone(),
        ];
        for key in FieldKey::ALL {
            row.push(format_value(key, r.get(key)));
        }
        wtr.write_record(&row)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

fn format_value(key: FieldKey, value: f64) -> String {
    if key.is_volume() || value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize the sorted records as a pretty JSON array.
pub fn export_json(table: &ResultTable) -> Result<String> {
    let mut sorted = table.clone();
    sorted.sort_for_presentation();
    serde_json::to_string_pretty(sorted.records()).context("failed to serialize result table")
}

// ─── Files ──────────────────────────────────────────────────────────

/// Paths written by [`save_table`].
#[derive(Debug, Clone)]
pub struct SavedFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Write `<stem>.csv` and `<stem>.json` into `dir`, creating it if needed.
pub fn save_table(table: &ResultTable, dir: &Path, stem: &str) -> Result<SavedFiles> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let csv = dir.join(format!("{stem}.csv"));
    std::fs::write(&csv, export_csv(table)?)
        .with_context(|| format!("failed to write {}", csv.display()))?;

    let json = dir.join(format!("{stem}.json"));
    std::fs::write(&json, export_json(table)?)
        .with_context(|| format!("failed to write {}", json.display()))?;

    Ok(SavedFiles { csv, json })
}
