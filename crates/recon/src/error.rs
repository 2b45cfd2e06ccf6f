use std::fmt;

use crate::model::DuplicateKey;

#[derive(Debug)]
pub enum SyncError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (no sources, duplicate names, etc.).
    ConfigValidation(String),
    /// A workbook does not contain the sheet a source points at.
    MissingSheet { file: String, sheet: String },
    /// Primary-key column holds repeated values; the pass cannot run.
    DuplicateKeys {
        table: String,
        sheet: String,
        duplicates: Vec<DuplicateKey>,
    },
    /// IO error (file open, save, etc.).
    Io(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingSheet { file, sheet } => {
                write!(f, "[{file}] has no sheet named '{sheet}'")
            }
            Self::DuplicateKeys { table, sheet, duplicates } => {
                write!(
                    f,
                    "[{table}] ({sheet}) contains the following duplicate keys in the first column:"
                )?;
                for dup in duplicates {
                    write!(f, "\n\t'{}' occurrences: {}", dup.key, dup.count)?;
                }
                Ok(())
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}
