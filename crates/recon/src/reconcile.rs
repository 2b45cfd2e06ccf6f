use capsync_engine::sheet::Sheet;
use chrono::NaiveDate;

use crate::headers::HeaderMatch;
use crate::index::{union_keys, RowIndex};
use crate::model::{TouchedCell, VisualState};
use crate::staleness;
use crate::style;

/// What one reconcile call did to the destination sheet.
#[derive(Debug, Clone, Default)]
pub struct ReconcileStats {
    /// Changed cells plus gap fills in existing rows. Cells of new rows are not counted.
    pub cells_updated: usize,
    /// One per dump key absent from the destination.
    pub rows_appended: usize,
    pub stale_cells: usize,
    pub touched: Vec<TouchedCell>,
}

/// Merge the dump into `destination`.
///
/// Walks destination keys then dump-only keys. Keys with no dump row are left
/// alone. For each common column the dump row has a value for:
///
/// - destination cell present: overwrite and mark `Updated` if the values
///   differ (type-sensitive), otherwise mark `Reset`;
/// - destination row present, cell absent: fill it and mark `Updated`;
/// - no destination row: append one row (once per key, key in column 1),
///   then write into it and mark `Updated`.
///
/// Staleness is applied to each key's touched cells once its columns are done.
pub fn reconcile(
    headers: &HeaderMatch,
    dump_index: &RowIndex,
    dest_index: &RowIndex,
    destination: &mut Sheet,
    today: NaiveDate,
) -> ReconcileStats {
    let mut stats = ReconcileStats::default();

    for key in union_keys(dest_index, dump_index) {
        let Some(dump_row) = dump_index.get(key) else {
            continue;
        };
        let dest_row = dest_index.get(key);
        let mut touched: Vec<TouchedCell> = Vec::new();

        // New key: the row is created here and reused for every column below.
        let (row, is_new) = match dest_row {
            Some(existing) => (existing.row, false),
            None => {
                let row = destination.max_row() + 1;
                destination.set_value(row, 1, dump_row.key.clone());
                style::apply(destination, row, 1, VisualState::Updated);
                touched.push(TouchedCell {
                    row,
                    column: 1,
                    column_name: headers.destination.name_at(1).unwrap_or_default().to_string(),
                    state: VisualState::Updated,
                });
                stats.rows_appended += 1;
                (row, true)
            }
        };

        for column in &headers.common {
            let Some(dump_cell) = dump_row.cells.get(&column.name) else {
                continue;
            };

            let existing = dest_row.and_then(|r| r.cells.get(&column.name));
            let (target_row, target_col) = match existing {
                Some(cell) => (cell.row, cell.column),
                None => (row, column.dest_col),
            };

            let state = if is_new {
                destination.set_value(target_row, target_col, dump_cell.value.clone());
                VisualState::Updated
            } else if existing.is_some()
                && destination.value(target_row, target_col) == &dump_cell.value
            {
                VisualState::Reset
            } else {
                destination.set_value(target_row, target_col, dump_cell.value.clone());
                stats.cells_updated += 1;
                VisualState::Updated
            };
            style::apply(destination, target_row, target_col, state);

            match touched.iter_mut().find(|t| t.row == target_row && t.column == target_col) {
                Some(t) => t.state = state,
                None => touched.push(TouchedCell {
                    row: target_row,
                    column: target_col,
                    column_name: column.name.clone(),
                    state,
                }),
            }
        }

        stats.stale_cells += staleness::highlight(destination, &mut touched, today);
        stats.touched.extend(touched);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::match_headers;
    use capsync_engine::cell::{CellStyle, CellValue};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn run(dump: &Sheet, dest: &mut Sheet) -> ReconcileStats {
        let headers = match_headers(dump, dest);
        let dump_index = RowIndex::build(dump, &headers.dump_columns());
        let dest_index = RowIndex::build(dest, &headers.destination_columns());
        reconcile(&headers, &dump_index, &dest_index, dest, today())
    }

    fn rows(data: Vec<Vec<&str>>) -> Vec<Vec<CellValue>> {
        data.into_iter()
            .map(|r| r.into_iter().map(CellValue::from).collect())
            .collect()
    }

    #[test]
    fn sparse_row_is_filled_and_counted() {
        let dump = Sheet::from_rows("d", rows(vec![vec!["Number", "Owner"], vec!["K1", "ann"]]));
        let mut dest = Sheet::from_rows("D", rows(vec![vec!["Number", "Owner"], vec!["K1", ""]]));

        let stats = run(&dump, &mut dest);

        assert_eq!(stats.cells_updated, 1);
        assert_eq!(stats.rows_appended, 0);
        assert_eq!(dest.value(2, 2), &CellValue::from("ann"));
        assert_eq!(dest.style(2, 2), style::UPDATED);
        // Key column compared equal
        assert_eq!(dest.style(2, 1), style::RESET);
    }

    #[test]
    fn new_key_row_created_once_with_columns_resolved_per_side() {
        let dump = Sheet::from_rows(
            "d",
            rows(vec![vec!["Number", "Status", "Priority"], vec!["K9", "Closed", "2"]]),
        );
        let mut dest = Sheet::from_rows(
            "D",
            rows(vec![vec!["Number", "Priority", "Status"], vec!["K1", "1", "Open"]]),
        );

        let stats = run(&dump, &mut dest);

        assert_eq!(stats.rows_appended, 1);
        assert_eq!(stats.cells_updated, 0);
        assert_eq!(dest.max_row(), 3);
        assert_eq!(dest.value(3, 1), &CellValue::from("K9"));
        assert_eq!(dest.value(3, 2), &CellValue::from("2"));
        assert_eq!(dest.value(3, 3), &CellValue::from("Closed"));
        // Column 1 is common: touched once, not twice
        assert_eq!(stats.touched.iter().filter(|t| t.row == 3).count(), 3);
    }

    #[test]
    fn destination_only_keys_are_untouched() {
        let dump = Sheet::from_rows("d", rows(vec![vec!["Number", "Status"]]));
        let mut dest = Sheet::from_rows("D", rows(vec![vec!["Number", "Status"], vec!["K1", "Open"]]));
        let before = dest.clone();

        let stats = run(&dump, &mut dest);

        assert!(stats.touched.is_empty());
        assert_eq!(dest, before);
    }

    #[test]
    fn empty_dump_cell_does_not_clear_destination() {
        let dump = Sheet::from_rows("d", rows(vec![vec!["Number", "Status"], vec!["K1", ""]]));
        let mut dest = Sheet::from_rows("D", rows(vec![vec!["Number", "Status"], vec!["K1", "Open"]]));

        let stats = run(&dump, &mut dest);

        assert_eq!(stats.cells_updated, 0);
        assert_eq!(dest.value(2, 2), &CellValue::from("Open"));
    }

    #[test]
    fn formulas_compare_on_cached_result() {
        let mut dump = Sheet::from_rows("d", rows(vec![vec!["Number", "Count", "Total"], vec!["K1"]]));
        dump.set_value(2, 2, CellValue::Number(2.0));
        dump.set_value(2, 3, CellValue::Number(9.0));
        let mut dest = Sheet::from_rows(
            "D",
            rows(vec![vec!["Number", "Count", "Total", "Age"], vec!["K1"]]),
        );
        dest.set_formula(2, 2, "=1+1", CellValue::Number(2.0));
        dest.set_formula(2, 3, "=4+4", CellValue::Number(8.0));
        dest.set_formula(2, 4, "=TODAY()-B2", CellValue::Number(30.0));

        let stats = run(&dump, &mut dest);

        assert_eq!(stats.cells_updated, 1);
        // Equal result: formula kept
        assert_eq!(dest.formula(2, 2), Some("=1+1"));
        assert_eq!(dest.style(2, 2), style::RESET);
        // Different result: the dump value replaces the formula
        assert_eq!(dest.formula(2, 3), None);
        assert_eq!(dest.value(2, 3), &CellValue::Number(9.0));
        // Destination-only column is left alone
        assert_eq!(dest.formula(2, 4), Some("=TODAY()-B2"));
        assert_eq!(dest.style(2, 4), CellStyle::default());
    }

    #[test]
    fn number_and_text_differ() {
        let dump = Sheet::from_rows(
            "d",
            vec![
                vec![CellValue::from("Number"), CellValue::from("Count")],
                vec![CellValue::from("K1"), CellValue::Number(5.0)],
            ],
        );
        let mut dest = Sheet::from_rows("D", rows(vec![vec!["Number", "Count"], vec!["K1", "5"]]));

        let stats = run(&dump, &mut dest);

        assert_eq!(stats.cells_updated, 1);
        assert_eq!(dest.value(2, 2), &CellValue::Number(5.0));
    }
}
