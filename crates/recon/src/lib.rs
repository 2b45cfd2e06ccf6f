//! `capsync-recon`: dump → destination sheet reconciliation.
//!
//! Pure engine crate: receives loaded sheets, mutates the destination sheet
//! in memory and reports what it did. No file IO apart from reading a config.

pub mod config;
pub mod error;
pub mod headers;
pub mod index;
pub mod integrity;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod session;
pub mod staleness;
pub mod style;

pub use config::{SourceConfig, SyncConfig};
pub use error::SyncError;
pub use model::{PassOutcome, PassStage, SessionStats, SessionSummary, TouchedCell, VisualState};
pub use report::{LogReporter, MemoryReporter, Message, Reporter, Severity};
pub use session::{PassLabel, Session};
