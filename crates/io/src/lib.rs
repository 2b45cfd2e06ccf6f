// File I/O operations

pub mod csv;
pub mod xlsx;
pub mod xlsx_styles;

use std::path::Path;

use capsync_engine::workbook::Workbook;

/// Name given to the single sheet of a delimited dump
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Load any supported table file into a workbook.
///
/// Delimited files (`.csv`, `.tsv`, `.txt`) become a one-sheet workbook;
/// everything else goes through the spreadsheet importer.
pub fn load_table(path: &Path) -> Result<Workbook, String> {
    if is_delimited(path) {
        let sheet = csv::import(path, CSV_SHEET_NAME)?;
        return Ok(Workbook::from_sheets(vec![sheet]));
    }

    let (workbook, result) = xlsx::import(path)?;
    for warning in &result.warnings {
        log::warn!("{}: {}", path.display(), warning);
    }
    Ok(workbook)
}

fn is_delimited(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("csv") | Some("tsv") | Some("txt")
    )
}

/// Write a workbook back to disk.
///
/// Delimited paths receive the first sheet only; everything else is written as XLSX.
pub fn save_table(workbook: &Workbook, path: &Path) -> Result<(), String> {
    if is_delimited(path) {
        let sheet = workbook
            .first_sheet()
            .ok_or_else(|| format!("Nothing to write to '{}'", path.display()))?;
        return csv::export(sheet, path);
    }
    xlsx::export(workbook, path).map(|_| ())
}
