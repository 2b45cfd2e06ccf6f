use std::fmt;

use capsync_engine::cell::CellValue;
use chrono::{NaiveDate, NaiveDateTime};
use ordered_float::OrderedFloat;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Primary key
// ---------------------------------------------------------------------------

/// Hashable form of a primary-key cell.
///
/// Mirrors `CellValue` variant for variant, so `Number(123.0)` and
/// `Text("123")` stay distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Text(String),
    Number(OrderedFloat<f64>),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellKey {
    /// `None` for an empty cell: such rows are not data rows.
    pub fn from_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Empty => None,
            CellValue::Text(s) if s.is_empty() => None,
            CellValue::Text(s) => Some(Self::Text(s.clone())),
            CellValue::Number(n) => Some(Self::Number(OrderedFloat(*n))),
            CellValue::Bool(b) => Some(Self::Bool(*b)),
            CellValue::Date(d) => Some(Self::Date(*d)),
            CellValue::DateTime(dt) => Some(Self::DateTime(*dt)),
        }
    }

    pub fn to_value(&self) -> CellValue {
        match self {
            Self::Text(s) => CellValue::Text(s.clone()),
            Self::Number(n) => CellValue::Number(n.into_inner()),
            Self::Bool(b) => CellValue::Bool(*b),
            Self::Date(d) => CellValue::Date(*d),
            Self::DateTime(dt) => CellValue::DateTime(*dt),
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value().raw_display())
    }
}

/// A key seen more than once in a table's first column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub key: String,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Visual state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualState {
    /// Written this pass (changed value, gap fill or new row)
    Updated,
    /// Compared equal; any earlier highlight is cleared
    Reset,
    /// Holds a date strictly before the pass's reference day
    StalePast,
    None,
}

impl fmt::Display for VisualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated => write!(f, "updated"),
            Self::Reset => write!(f, "reset"),
            Self::StalePast => write!(f, "stale_past"),
            Self::None => write!(f, "none"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pass lifecycle
// ---------------------------------------------------------------------------

/// Per table-pair state machine.
///
/// `Start → HeaderIntersected → KeysValidated → Indexed → Reconciled →
/// Highlighted → Saved | CheckOnly`, or `Aborted` from the key check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStage {
    Start,
    HeaderIntersected,
    KeysValidated,
    Indexed,
    Reconciled,
    Highlighted,
    Saved,
    CheckOnly,
    Aborted,
}

impl fmt::Display for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::HeaderIntersected => "header_intersected",
            Self::KeysValidated => "keys_validated",
            Self::Indexed => "indexed",
            Self::Reconciled => "reconciled",
            Self::Highlighted => "highlighted",
            Self::Saved => "saved",
            Self::CheckOnly => "check_only",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// A destination cell written or compared during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TouchedCell {
    pub row: usize,
    pub column: usize,
    pub column_name: String,
    pub state: VisualState,
}

/// Header diagnostics for one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeaderReport {
    pub common: Vec<String>,
    pub dump_only: Vec<String>,
    pub destination_only: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    pub dump: String,
    pub destination: String,
    pub sheet: String,
    pub stage: PassStage,
    pub cells_updated: usize,
    pub rows_appended: usize,
    pub headers: HeaderReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dump_duplicates: Vec<DuplicateKey>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destination_duplicates: Vec<DuplicateKey>,
    pub touched: Vec<TouchedCell>,
}

impl PassOutcome {
    pub fn is_aborted(&self) -> bool {
        self.stage == PassStage::Aborted
    }

    /// Number of touched cells currently in `state`.
    pub fn count_state(&self, state: VisualState) -> usize {
        self.touched.iter().filter(|t| t.state == state).count()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Session-scoped counters. Created at session start, never global.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub cells_updated: usize,
    pub rows_appended: usize,
    pub errors: usize,
    pub warnings: usize,
    pub passes_run: usize,
    pub passes_aborted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub today: NaiveDate,
    pub saved: bool,
    #[serde(flatten)]
    pub stats: SessionStats,
    /// Filled in by the caller; the engine never reads a clock.
    pub elapsed_ms: u128,
    pub passes: Vec<PassOutcome>,
}
