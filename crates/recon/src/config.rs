use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::SyncError;

pub const DEFAULT_DESTINATION: &str = "capacity-tracker.xlsx";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_destination")]
    pub destination: String,
    /// Destination sheet made active when the workbook is saved.
    #[serde(default)]
    pub open_sheet: Option<String>,
    /// Column names (case-insensitive) filled with dates by `generate`.
    #[serde(default = "default_date_fields")]
    pub date_fields: Vec<String>,
    pub sources: Vec<SourceConfig>,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// One dump file and the destination sheet it feeds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    pub file: String,
    pub sheet: String,
    /// Sheet to read inside the dump; first sheet when absent.
    #[serde(default)]
    pub dump_sheet: Option<String>,
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl SourceConfig {
    fn builtin(name: &str, sheet: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            file: format!("dump-{name}.xlsx"),
            sheet: sheet.to_string(),
            dump_sheet: None,
            key_prefix: Some(prefix.to_string()),
        }
    }

    /// Prefix for generated keys: configured, or the first three letters of the name.
    pub fn key_prefix(&self) -> String {
        match &self.key_prefix {
            Some(p) => p.clone(),
            None => self.name.chars().take(3).collect::<String>().to_uppercase(),
        }
    }
}

fn default_name() -> String {
    "capsync".to_string()
}

fn default_destination() -> String {
    DEFAULT_DESTINATION.to_string()
}

fn default_date_fields() -> Vec<String> {
    vec!["opened".to_string(), "planned fix date".to_string()]
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            name: "Hypercare capacity tracker".to_string(),
            destination: default_destination(),
            open_sheet: Some("Hypercare Incidents".to_string()),
            date_fields: default_date_fields(),
            sources: vec![
                SourceConfig::builtin("incidents", "Hypercare Incidents", "INC"),
                SourceConfig::builtin("defects", "Hypercare Defects", "DFC"),
                SourceConfig::builtin("enhancements", "Hypercare Enhancements", "ENH"),
                SourceConfig::builtin("alm", "ALM Defects", "ALM"),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, SyncError> {
        let config: SyncConfig =
            toml::from_str(input).map_err(|e| SyncError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.destination.trim().is_empty() {
            return Err(SyncError::ConfigValidation("destination must not be empty".into()));
        }

        if self.sources.is_empty() {
            return Err(SyncError::ConfigValidation(
                "at least one [[sources]] entry is required".into(),
            ));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(SyncError::ConfigValidation("source name must not be empty".into()));
            }
            if !names.insert(source.name.as_str()) {
                return Err(SyncError::ConfigValidation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if source.file.trim().is_empty() {
                return Err(SyncError::ConfigValidation(format!(
                    "source '{}': file must not be empty",
                    source.name
                )));
            }
            if source.sheet.is_empty() {
                return Err(SyncError::ConfigValidation(format!(
                    "source '{}': sheet must not be empty",
                    source.name
                )));
            }
        }

        if let Some(open) = &self.open_sheet {
            if !self.sources.iter().any(|s| &s.sheet == open) {
                return Err(SyncError::ConfigValidation(format!(
                    "open_sheet '{open}' is not the sheet of any source"
                )));
            }
        }

        Ok(())
    }

    /// Case-insensitive membership in `date_fields`.
    pub fn is_date_field(&self, column: &str) -> bool {
        let column = column.trim().to_lowercase();
        self.date_fields.iter().any(|f| f.trim().to_lowercase() == column)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
