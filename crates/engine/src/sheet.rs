use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellStyle, CellValue};

static EMPTY: CellValue = CellValue::Empty;

/// A single worksheet.
///
/// Coordinates are 1-based, `(row, col)`, with row 1 reserved for headers by
/// convention. Extents behave like a spreadsheet's used range: they grow on
/// every write (values and styles alike) and only shrink on `clear_rows_from`,
/// so `max_row()` may over-report the last row holding data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    cells: FxHashMap<(usize, usize), Cell>,
    col_widths: FxHashMap<usize, f64>,
    max_row: usize,
    max_col: usize,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: FxHashMap::default(),
            col_widths: FxHashMap::default(),
            max_row: 0,
            max_col: 0,
        }
    }

    /// Build a sheet from rows of values, starting at A1.
    pub fn from_rows<I, R>(name: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = CellValue>,
    {
        let mut sheet = Sheet::new(name);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                if !value.is_empty() {
                    sheet.set_value(r + 1, c + 1, value);
                }
            }
        }
        sheet
    }

    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        self.cells.get(&(row, col)).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    /// Write a plain value. Any formula in the cell is replaced.
    pub fn set_value(&mut self, row: usize, col: usize, value: CellValue) {
        debug_assert!(row >= 1 && col >= 1, "sheet coordinates are 1-based");
        let cell = self.cells.entry((row, col)).or_default();
        cell.value = value;
        cell.formula = None;
        self.grow(row, col);
    }

    /// Store a formula with its last computed result. `value()` keeps
    /// returning the result.
    pub fn set_formula(
        &mut self,
        row: usize,
        col: usize,
        formula: impl Into<String>,
        result: CellValue,
    ) {
        debug_assert!(row >= 1 && col >= 1, "sheet coordinates are 1-based");
        let cell = self.cells.entry((row, col)).or_default();
        cell.value = result;
        cell.formula = Some(formula.into());
        self.grow(row, col);
    }

    pub fn formula(&self, row: usize, col: usize) -> Option<&str> {
        self.cells.get(&(row, col)).and_then(|c| c.formula.as_deref())
    }

    pub fn style(&self, row: usize, col: usize) -> CellStyle {
        self.cells.get(&(row, col)).map(|c| c.style).unwrap_or_default()
    }

    pub fn set_style(&mut self, row: usize, col: usize, style: CellStyle) {
        debug_assert!(row >= 1 && col >= 1, "sheet coordinates are 1-based");
        self.cells.entry((row, col)).or_default().style = style;
        self.grow(row, col);
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Iterate all stored cells in arbitrary order.
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    /// Last row of the used range (0 for an untouched sheet).
    pub fn max_row(&self) -> usize {
        self.max_row
    }

    /// Last column of the used range (0 for an untouched sheet).
    pub fn max_column(&self) -> usize {
        self.max_col
    }

    /// Number of stored cells holding a non-empty value.
    pub fn non_empty_count(&self) -> usize {
        self.cells.values().filter(|c| !c.value.is_empty()).count()
    }

    /// Delete every row at or below `row` (values and styles).
    pub fn clear_rows_from(&mut self, row: usize) {
        self.cells.retain(|&(r, _), _| r < row);
        self.max_row = self.cells.keys().map(|&(r, _)| r).max().unwrap_or(0);
        self.max_col = self.cells.keys().map(|&(_, c)| c).max().unwrap_or(0);
    }

    pub fn set_column_width(&mut self, col: usize, width: f64) {
        self.col_widths.insert(col, width);
    }

    pub fn column_width(&self, col: usize) -> Option<f64> {
        self.col_widths.get(&col).copied()
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (&usize, &f64)> {
        self.col_widths.iter()
    }

    fn grow(&mut self, row: usize, col: usize) {
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
    }
}
