use capsync_engine::cell::CellValue;
use capsync_engine::sheet::Sheet;
use chrono::{NaiveDate, NaiveDateTime};

use crate::model::{TouchedCell, VisualState};
use crate::style;

const DATETIME_PATTERNS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Calendar date held by a cell, if any.
///
/// Typed dates and ISO-8601 text (`YYYY-MM-DD`, optionally with a time) are
/// dates. Anything else, including ambiguous forms like `01/02/2024`, is not.
pub fn date_of(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Date(d) => Some(*d),
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Text(s) => {
            let s = s.trim();
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(d);
            }
            DATETIME_PATTERNS
                .iter()
                .find_map(|p| NaiveDateTime::parse_from_str(s, p).ok())
                .map(|dt| dt.date())
        }
        _ => None,
    }
}

/// Strictly before `today`, time of day ignored.
pub fn is_stale(value: &CellValue, today: NaiveDate) -> bool {
    date_of(value).is_some_and(|d| d < today)
}

/// Re-mark touched cells holding a past date as `StalePast`, whatever
/// state the reconciler gave them.
pub fn highlight(sheet: &mut Sheet, touched: &mut [TouchedCell], today: NaiveDate) -> usize {
    let mut flagged = 0;
    for cell in touched.iter_mut() {
        if is_stale(sheet.value(cell.row, cell.column), today) {
            cell.state = VisualState::StalePast;
            style::apply(sheet, cell.row, cell.column, VisualState::StalePast);
            flagged += 1;
        }
    }
    flagged
}
