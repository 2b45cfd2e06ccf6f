use std::collections::HashMap;

use capsync_engine::sheet::Sheet;

use crate::model::HeaderReport;

/// Column names of one table, read from row 1.
///
/// Collection stops at the first empty header cell; the sheet's column
/// count is not trusted. Names are taken verbatim (no trimming, no case
/// folding). A repeated name keeps its first column.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    columns: Vec<(String, usize)>,
    by_name: HashMap<String, usize>,
    repeated: Vec<(String, usize)>,
}

impl HeaderSet {
    pub fn from_sheet(sheet: &Sheet) -> Self {
        let mut set = HeaderSet::default();
        let mut col = 1;
        loop {
            let value = sheet.value(1, col);
            if value.is_empty() {
                break;
            }
            let name = value.raw_display();
            if set.by_name.contains_key(&name) {
                set.repeated.push((name, col));
            } else {
                set.by_name.insert(name.clone(), col);
                set.columns.push((name, col));
            }
            col += 1;
        }
        set
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Name whose (first) column is `col`.
    pub fn name_at(&self, col: usize) -> Option<&str> {
        self.columns.iter().find(|(_, c)| *c == col).map(|(n, _)| n.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Later occurrences of an already-seen name, as `(name, column)`.
    pub fn repeated(&self) -> &[(String, usize)] {
        &self.repeated
    }
}

/// A column present in both tables, with its index on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonColumn {
    pub name: String,
    pub dump_col: usize,
    pub dest_col: usize,
}

#[derive(Debug, Clone)]
pub struct HeaderMatch {
    pub dump: HeaderSet,
    pub destination: HeaderSet,
    /// In destination column order.
    pub common: Vec<CommonColumn>,
    pub dump_only: Vec<String>,
    pub destination_only: Vec<String>,
    /// `(dump name, destination name)` pairs that differ only by case or
    /// surrounding whitespace. Reported, never matched.
    pub near_misses: Vec<(String, String)>,
}

impl HeaderMatch {
    pub fn dump_columns(&self) -> Vec<(&str, usize)> {
        self.common.iter().map(|c| (c.name.as_str(), c.dump_col)).collect()
    }

    pub fn destination_columns(&self) -> Vec<(&str, usize)> {
        self.common.iter().map(|c| (c.name.as_str(), c.dest_col)).collect()
    }

    pub fn report(&self) -> HeaderReport {
        HeaderReport {
            common: self.common.iter().map(|c| c.name.clone()).collect(),
            dump_only: self.dump_only.clone(),
            destination_only: self.destination_only.clone(),
        }
    }
}

pub fn match_headers(dump: &Sheet, destination: &Sheet) -> HeaderMatch {
    let dump_set = HeaderSet::from_sheet(dump);
    let dest_set = HeaderSet::from_sheet(destination);

    let common: Vec<CommonColumn> = dest_set
        .columns
        .iter()
        .filter_map(|(name, dest_col)| {
            dump_set.column(name).map(|dump_col| CommonColumn {
                name: name.clone(),
                dump_col,
                dest_col: *dest_col,
            })
        })
        .collect();

    let dump_only: Vec<String> = dump_set
        .names()
        .filter(|n| dest_set.column(n).is_none())
        .map(str::to_string)
        .collect();
    let destination_only: Vec<String> = dest_set
        .names()
        .filter(|n| dump_set.column(n).is_none())
        .map(str::to_string)
        .collect();

    let mut near_misses = Vec::new();
    for d in &dump_only {
        let folded = fold(d);
        if let Some(x) = destination_only.iter().find(|x| fold(x) == folded) {
            near_misses.push((d.clone(), x.clone()));
        }
    }

    HeaderMatch {
        dump: dump_set,
        destination: dest_set,
        common,
        dump_only,
        destination_only,
        near_misses,
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}
