use std::collections::HashMap;

use capsync_engine::sheet::Sheet;

use crate::error::SyncError;
use crate::model::{CellKey, DuplicateKey};

/// Keys occurring more than once in column 1 (rows 2..), in first-seen order.
///
/// Rows with an empty key cell are not data rows and are skipped.
pub fn find_duplicate_keys(sheet: &Sheet) -> Vec<DuplicateKey> {
    let mut counts: HashMap<CellKey, usize> = HashMap::new();
    let mut order: Vec<CellKey> = Vec::new();

    for row in 2..=sheet.max_row() {
        let Some(key) = CellKey::from_value(sheet.value(row, 1)) else {
            continue;
        };
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter_map(|key| {
            let count = counts.get(&key).copied().unwrap_or(0);
            (count > 1).then(|| DuplicateKey { key: key.to_string(), count })
        })
        .collect()
}

/// Fail with `DuplicateKeys` when `sheet` cannot take part in a pass.
pub fn ensure_unique_keys(sheet: &Sheet, table: &str) -> Result<(), SyncError> {
    let duplicates = find_duplicate_keys(sheet);
    if duplicates.is_empty() {
        return Ok(());
    }
    Err(SyncError::DuplicateKeys {
        table: table.to_string(),
        sheet: sheet.name.clone(),
        duplicates,
    })
}
