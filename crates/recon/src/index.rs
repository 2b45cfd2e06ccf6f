use std::collections::HashMap;

use capsync_engine::cell::CellValue;
use capsync_engine::sheet::Sheet;

use crate::model::CellKey;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedCell {
    pub value: CellValue,
    pub row: usize,
    pub column: usize,
}

/// One data row: its key and every non-empty common cell, by column name.
#[derive(Debug, Clone)]
pub struct IndexedRow {
    pub key: CellValue,
    pub row: usize,
    pub cells: HashMap<String, IndexedCell>,
}

/// Primary key → row, in sheet order.
///
/// Built fresh for every pass; nothing is carried between passes. If a key
/// repeats, the first row wins (the integrity check refuses such tables
/// before they get here).
#[derive(Debug, Clone, Default)]
pub struct RowIndex {
    order: Vec<CellKey>,
    rows: HashMap<CellKey, IndexedRow>,
}

impl RowIndex {
    /// Index `sheet` over `columns` (`(name, column in this sheet)`).
    pub fn build(sheet: &Sheet, columns: &[(&str, usize)]) -> Self {
        let mut index = RowIndex::default();

        for row in 2..=sheet.max_row() {
            let key_value = sheet.value(row, 1);
            let Some(key) = CellKey::from_value(key_value) else {
                continue;
            };
            if index.rows.contains_key(&key) {
                continue;
            }

            let cells = columns
                .iter()
                .filter_map(|&(name, column)| {
                    let value = sheet.value(row, column);
                    (!value.is_empty()).then(|| {
                        (name.to_string(), IndexedCell { value: value.clone(), row, column })
                    })
                })
                .collect();

            index.order.push(key.clone());
            index.rows.insert(key, IndexedRow { key: key_value.clone(), row, cells });
        }

        index
    }

    pub fn get(&self, key: &CellKey) -> Option<&IndexedRow> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &CellKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn keys(&self) -> &[CellKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Keys of `first` in order, then keys only in `second`.
pub fn union_keys<'a>(first: &'a RowIndex, second: &'a RowIndex) -> Vec<&'a CellKey> {
    first
        .keys()
        .iter()
        .chain(second.keys().iter().filter(|k| !first.contains(k)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Sheet {
        Sheet::from_rows(
            "S",
            vec![
                vec!["Number".into(), "Status".into(), "Priority".into()],
                vec!["K1".into(), "Open".into(), CellValue::Empty],
                vec![CellValue::Empty, "ghost".into(), "x".into()],
                vec!["K2".into(), "Closed".into(), "1 - Critical".into()],
            ],
        )
    }

    fn key(s: &str) -> CellKey {
        CellKey::Text(s.to_string())
    }

    #[test]
    fn indexes_sparse_cells_with_coordinates() {
        let idx = RowIndex::build(&sheet(), &[("Status", 2), ("Priority", 3)]);
        assert_eq!(idx.len(), 2);

        let k1 = idx.get(&key("K1")).unwrap();
        assert_eq!(k1.row, 2);
        assert_eq!(k1.cells.len(), 1);
        assert!(!k1.cells.contains_key("Priority"));

        let k2 = idx.get(&key("K2")).unwrap();
        assert_eq!(
            k2.cells["Priority"],
            IndexedCell { value: "1 - Critical".into(), row: 4, column: 3 }
        );
    }

    #[test]
    fn keys_are_indexed_without_common_columns() {
        let idx = RowIndex::build(&sheet(), &[]);
        assert_eq!(idx.keys(), &[key("K1"), key("K2")]);
        assert!(idx.get(&key("K1")).unwrap().cells.is_empty());
    }

    #[test]
    fn union_is_first_then_second_only() {
        let a = RowIndex::build(&sheet(), &[]);
        let b = RowIndex::build(
            &Sheet::from_rows(
                "B",
                vec![
                    vec![CellValue::from("Number")],
                    vec![CellValue::from("K3")],
                    vec![CellValue::from("K1")],
                ],
            ),
            &[],
        );
        let keys: Vec<String> = union_keys(&a, &b).iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["K1", "K2", "K3"]);
    }
}
