// Excel file import (xlsx, xls, xlsb, ods) and export (xlsx only)
//
// Import: values and formulas via calamine, plus fill/font colours and column
//         widths from the XLSX package so highlights survive a load/save cycle.
// Export: full rewrite of the workbook. Sheet order, active sheet, typed
//         values, formulas (with their cached results), cell colours and
//         column widths are kept; merges and validation are not.

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use capsync_engine::cell::{CellStyle, CellValue};
use capsync_engine::sheet::Sheet;
use capsync_engine::workbook::Workbook;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_xlsxwriter::{Color, Format, Formula, Workbook as XlsxWorkbook, Worksheet};

use crate::xlsx_styles;

/// Largest Excel serial we convert to a date (9999-12-31)
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Per-sheet import statistics
#[derive(Debug, Default, Clone)]
pub struct SheetStats {
    pub name: String,
    pub cells_imported: usize,
    pub dates_imported: usize,
    pub formulas_imported: usize,
    pub styles_imported: usize,
}

/// Result of an Excel import operation
#[derive(Debug, Default)]
pub struct ImportResult {
    pub sheet_stats: Vec<SheetStats>,
    pub sheets_imported: usize,
    pub cells_imported: usize,
    pub dates_imported: usize,
    /// Formula cells; their cached results are the cell values
    pub formulas_imported: usize,
    /// Cells that received a non-default style from the XLSX style table
    pub styles_imported: usize,
    /// Actionable warnings (not boilerplate)
    pub warnings: Vec<String>,
    pub import_duration_ms: u128,
}

/// Result of an Excel export operation
#[derive(Debug, Default)]
pub struct ExportResult {
    pub sheets_exported: usize,
    pub cells_exported: usize,
    pub formulas_exported: usize,
    pub export_duration_ms: u128,
}

impl ExportResult {
    pub fn summary(&self) -> String {
        format!(
            "{} sheet{}, {} cells, {} formulas",
            self.sheets_exported,
            if self.sheets_exported == 1 { "" } else { "s" },
            self.cells_exported,
            self.formulas_exported
        )
    }
}

/// Import an Excel file (xlsx, xls, xlsb, ods)
pub fn import(path: &Path) -> Result<(Workbook, ImportResult), String> {
    let start_time = Instant::now();

    let mut source: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open '{}': {}", path.display(), e))?;

    let sheet_names: Vec<String> = source.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(format!("'{}' contains no sheets", path.display()));
    }

    let mut result = ImportResult::default();
    let mut sheets: Vec<Sheet> = Vec::with_capacity(sheet_names.len());

    for sheet_name in &sheet_names {
        let range = source
            .worksheet_range(sheet_name)
            .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

        let mut sheet = Sheet::new(sheet_name.clone());
        let mut stats = SheetStats {
            name: sheet_name.clone(),
            ..Default::default()
        };

        // Range start offset (data may not begin at A1)
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        for (row_idx, row) in range.rows().enumerate() {
            let target_row = start_row as usize + row_idx + 1;
            for (col_idx, data) in row.iter().enumerate() {
                let target_col = start_col as usize + col_idx + 1;
                let value = convert_data(data);
                if value.is_empty() {
                    continue;
                }
                if matches!(value, CellValue::Date(_) | CellValue::DateTime(_)) {
                    stats.dates_imported += 1;
                }
                sheet.set_value(target_row, target_col, value);
                stats.cells_imported += 1;
            }
        }

        // Formulas come from a separate range; the value pass above already
        // stored their cached results.
        match source.worksheet_formula(sheet_name) {
            Ok(formulas) => {
                let (start_row, start_col) = formulas.start().unwrap_or((0, 0));
                for (row_idx, row) in formulas.rows().enumerate() {
                    let target_row = start_row as usize + row_idx + 1;
                    for (col_idx, formula) in row.iter().enumerate() {
                        if formula.is_empty() {
                            continue;
                        }
                        let target_col = start_col as usize + col_idx + 1;
                        let source_text = if formula.starts_with('=') {
                            formula.clone()
                        } else {
                            format!("={}", formula)
                        };
                        let cached = sheet.value(target_row, target_col).clone();
                        sheet.set_formula(target_row, target_col, source_text, cached);
                        stats.formulas_imported += 1;
                    }
                }
            }
            Err(e) => log::debug!("no formulas read from '{}': {}", sheet_name, e),
        }

        result.cells_imported += stats.cells_imported;
        result.dates_imported += stats.dates_imported;
        result.formulas_imported += stats.formulas_imported;
        result.sheet_stats.push(stats);
        result.sheets_imported += 1;
        sheets.push(sheet);
    }

    if is_xlsx_package(path) {
        match xlsx_styles::parse_xlsx_formatting(path, &sheet_names) {
            Ok((style_table, formats)) => {
                for ((sheet, formatting), stats) in sheets
                    .iter_mut()
                    .zip(formats.iter())
                    .zip(result.sheet_stats.iter_mut())
                {
                    for &(row, col, style_id) in &formatting.cell_styles {
                        if let Some(style) = style_table.get(style_id) {
                            if !style.is_default() {
                                sheet.set_style(row, col, *style);
                                stats.styles_imported += 1;
                            }
                        }
                    }
                    for (&col, &width) in &formatting.col_widths {
                        sheet.set_column_width(col, character_width(width));
                    }
                    result.styles_imported += stats.styles_imported;
                }
            }
            Err(e) => {
                log::warn!("styles not recovered from {}: {}", path.display(), e);
                result.warnings.push(format!("Cell styles not imported: {}", e));
            }
        }
    }

    let mut workbook = Workbook::from_sheets(sheets);
    workbook.set_active_index(0);

    result.import_duration_ms = start_time.elapsed().as_millis();
    log::debug!(
        "imported {}: {} sheets, {} cells, {} formulas, {} styled in {} ms",
        path.display(),
        result.sheets_imported,
        result.cells_imported,
        result.formulas_imported,
        result.styles_imported,
        result.import_duration_ms
    );
    Ok((workbook, result))
}

fn is_xlsx_package(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("xlsx") | Some("xlsm")
    )
}

/// Map a calamine cell to a typed value.
fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Assumes the 1900 date system (calamine does not expose the 1904 flag)
        Data::DateTime(dt) => serial_to_value(dt.as_f64()),
        Data::DateTimeIso(s) => match CellValue::from_input(s) {
            v @ (CellValue::Date(_) | CellValue::DateTime(_)) => v,
            _ => CellValue::Text(s.clone()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

/// Undo the cell padding Excel stores in `<col width>`, so a width written by
/// `export` reads back unchanged. 7 px per character plus 5 px padding.
fn character_width(stored: f64) -> f64 {
    let pixels = (stored * 7.0).round();
    if pixels >= 12.0 {
        (pixels - 5.0) / 7.0
    } else {
        stored
    }
}

fn excel_epoch() -> NaiveDate {
    // 1899-12-30 is serial 0 once the 1900 leap-year bug is folded in
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Convert an Excel serial date to `Date` (no time part) or `DateTime`.
pub fn serial_to_value(serial: f64) -> CellValue {
    if !(0.0..=MAX_DATE_SERIAL).contains(&serial) {
        return CellValue::Number(serial);
    }

    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    let Some(date) = excel_epoch().checked_add_signed(Duration::days(days as i64)) else {
        return CellValue::Number(serial);
    };

    if seconds == 0 {
        CellValue::Date(date)
    } else {
        CellValue::DateTime(date.and_time(NaiveTime::MIN) + Duration::seconds(seconds))
    }
}

fn date_to_serial(date: NaiveDate) -> f64 {
    (date - excel_epoch()).num_days() as f64
}

fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    date_to_serial(dt.date()) + dt.time().num_seconds_from_midnight() as f64 / 86_400.0
}

/// Export a workbook to XLSX, replacing the file at `path`.
pub fn export(workbook: &Workbook, path: &Path) -> Result<ExportResult, String> {
    let start_time = Instant::now();
    let mut result = ExportResult::default();

    let mut xlsx_workbook = XlsxWorkbook::new();

    for sheet in workbook.sheets() {
        let worksheet = xlsx_workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;

        for (&col, &width) in sheet.column_widths() {
            worksheet
                .set_column_width(to_xlsx_col(col)?, width)
                .map_err(|e| format!("Failed to set column {} width: {}", col, e))?;
        }

        let (cells, formulas) = export_sheet_cells(sheet, worksheet)?;
        result.cells_exported += cells;
        result.formulas_exported += formulas;
        result.sheets_exported += 1;
    }

    if let Ok(ws) = xlsx_workbook.worksheet_from_index(workbook.active_sheet_index()) {
        ws.set_active(true);
    }

    xlsx_workbook
        .save(path)
        .map_err(|e| format!("Failed to save '{}': {}", path.display(), e))?;

    result.export_duration_ms = start_time.elapsed().as_millis();
    log::debug!("exported {}: {}", path.display(), result.summary());
    Ok(result)
}

fn to_xlsx_row(row: usize) -> Result<u32, String> {
    u32::try_from(row.saturating_sub(1)).map_err(|_| format!("row {} out of range", row))
}

fn to_xlsx_col(col: usize) -> Result<u16, String> {
    u16::try_from(col.saturating_sub(1)).map_err(|_| format!("column {} out of range", col))
}

/// Write every stored cell. Returns `(cells written, of which formulas)`.
fn export_sheet_cells(
    sheet: &Sheet,
    worksheet: &mut Worksheet,
) -> Result<(usize, usize), String> {
    let mut cells_exported = 0;
    let mut formulas_exported = 0;

    for (&(row, col), cell) in sheet.cells_iter() {
        let row32 = to_xlsx_row(row)?;
        let col16 = to_xlsx_col(col)?;
        let format = build_excel_format(&cell.style);
        let write_err = |e: rust_xlsxwriter::XlsxError| {
            format!("Failed to write cell ({}, {}) in '{}': {}", row, col, sheet.name, e)
        };

        if let Some(source) = &cell.formula {
            let (format, cached) = formula_result(&cell.value, format);
            let formula = Formula::new(source).set_result(cached);
            worksheet
                .write_formula_with_format(row32, col16, formula, &format)
                .map_err(write_err)?;
            formulas_exported += 1;
            cells_exported += 1;
            continue;
        }

        match &cell.value {
            CellValue::Empty => {
                if cell.style.is_default() {
                    continue;
                }
                worksheet.write_blank(row32, col16, &format).map_err(write_err)?;
            }
            CellValue::Text(s) => {
                worksheet
                    .write_string_with_format(row32, col16, s, &format)
                    .map_err(write_err)?;
            }
            CellValue::Number(n) => {
                worksheet
                    .write_number_with_format(row32, col16, *n, &format)
                    .map_err(write_err)?;
            }
            CellValue::Bool(b) => {
                worksheet
                    .write_boolean_with_format(row32, col16, *b, &format)
                    .map_err(write_err)?;
            }
            CellValue::Date(d) => {
                let format = format.set_num_format(DATE_FORMAT);
                worksheet
                    .write_number_with_format(row32, col16, date_to_serial(*d), &format)
                    .map_err(write_err)?;
            }
            CellValue::DateTime(dt) => {
                let format = format.set_num_format(DATETIME_FORMAT);
                worksheet
                    .write_number_with_format(row32, col16, datetime_to_serial(*dt), &format)
                    .map_err(write_err)?;
            }
        }
        cells_exported += 1;
    }

    Ok((cells_exported, formulas_exported))
}

/// Cached result text for a formula cell, plus the number format its type needs.
///
/// The result is what readers see until the workbook is recalculated. Numeric
/// text is stored as a number, anything else as a string, so a boolean result
/// reads back as the text `TRUE`/`FALSE`.
fn formula_result(value: &CellValue, format: Format) -> (Format, String) {
    match value {
        CellValue::Empty => (format, String::new()),
        CellValue::Text(s) => (format, s.clone()),
        CellValue::Number(n) => (format, n.to_string()),
        CellValue::Bool(b) => (format, if *b { "TRUE" } else { "FALSE" }.to_string()),
        CellValue::Date(d) => (format.set_num_format(DATE_FORMAT), date_to_serial(*d).to_string()),
        CellValue::DateTime(dt) => (
            format.set_num_format(DATETIME_FORMAT),
            datetime_to_serial(*dt).to_string(),
        ),
    }
}

fn build_excel_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    if let Some(fill) = style.fill {
        format = format.set_background_color(Color::RGB(fill.0));
    }
    if let Some(font) = style.font_color {
        format = format.set_font_color(Color::RGB(font.0));
    }

    format
}
