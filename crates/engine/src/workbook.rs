use serde::{Deserialize, Serialize};

use crate::sheet::Sheet;

/// An ordered collection of named sheets with one active sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    active_sheet: usize,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self { sheets, active_sheet: 0 }
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a sheet by exact name
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    pub fn first_sheet_mut(&mut self) -> Option<&mut Sheet> {
        self.sheets.first_mut()
    }

    /// Append a sheet. Returns false (and drops nothing) if the name is taken.
    pub fn add_sheet(&mut self, sheet: Sheet) -> bool {
        if self.sheet(&sheet.name).is_some() {
            return false;
        }
        self.sheets.push(sheet);
        true
    }

    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    /// Make the named sheet active. Returns false if no such sheet exists.
    pub fn set_active(&mut self, name: &str) -> bool {
        match self.sheets.iter().position(|s| s.name == name) {
            Some(idx) => {
                self.active_sheet = idx;
                true
            }
            None => false,
        }
    }

    pub fn set_active_index(&mut self, index: usize) -> bool {
        if index < self.sheets.len() {
            self.active_sheet = index;
            true
        } else {
            false
        }
    }
}
