// Config discovery and path resolution

use std::path::{Path, PathBuf};

use capsync_engine::sheet::Sheet;
use capsync_engine::workbook::Workbook;
use capsync_recon::{SourceConfig, SyncConfig, SyncError};

use crate::CliError;

pub const DEFAULT_CONFIG_FILE: &str = "capsync.toml";

/// Loaded config plus the directory its relative paths resolve against.
pub struct Project {
    pub config: SyncConfig,
    pub base_dir: PathBuf,
    pub config_path: Option<PathBuf>,
}

impl Project {
    /// `--config` wins; then `./capsync.toml`; then the built-in sources.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, CliError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.is_file().then_some(local)
            }
        };

        match path {
            Some(path) => {
                let config = SyncConfig::load(&path)?;
                let base_dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                Ok(Self { config, base_dir, config_path: Some(path) })
            }
            None => Ok(Self {
                config: SyncConfig::default(),
                base_dir: PathBuf::from("."),
                config_path: None,
            }),
        }
    }

    pub fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn source_label(&self) -> String {
        match &self.config_path {
            Some(p) => p.display().to_string(),
            None => "built-in defaults".to_string(),
        }
    }

    pub fn destination_path(&self) -> PathBuf {
        self.resolve(&self.config.destination)
    }

    /// Load the destination and every dump, in config order.
    ///
    /// Any failure aborts the whole session before a pass runs, so sheets are
    /// checked here as well.
    pub fn load_all(&self) -> Result<(Workbook, Vec<Workbook>), SyncError> {
        let destination = load(&self.destination_path())?;
        let mut dumps = Vec::with_capacity(self.config.sources.len());

        for source in &self.config.sources {
            let dump = load(&self.resolve(&source.file))?;
            dump_sheet(&dump, source)?;
            if destination.sheet(&source.sheet).is_none() {
                return Err(SyncError::MissingSheet {
                    file: self.config.destination.clone(),
                    sheet: source.sheet.clone(),
                });
            }
            dumps.push(dump);
        }

        Ok((destination, dumps))
    }
}

fn load(path: &Path) -> Result<Workbook, SyncError> {
    capsync_io::load_table(path).map_err(SyncError::Io)
}

/// The sheet a source reads: `dump_sheet` when set, else the first sheet.
pub fn dump_sheet<'a>(dump: &'a Workbook, source: &SourceConfig) -> Result<&'a Sheet, SyncError> {
    let sheet = match &source.dump_sheet {
        Some(name) => dump.sheet(name),
        None => dump.first_sheet(),
    };
    sheet.ok_or_else(|| SyncError::MissingSheet {
        file: source.file.clone(),
        sheet: source.dump_sheet.clone().unwrap_or_else(|| "<first sheet>".to_string()),
    })
}

pub fn dump_sheet_mut<'a>(
    dump: &'a mut Workbook,
    source: &SourceConfig,
) -> Result<&'a mut Sheet, SyncError> {
    let missing = || SyncError::MissingSheet {
        file: source.file.clone(),
        sheet: source.dump_sheet.clone().unwrap_or_else(|| "<first sheet>".to_string()),
    };
    match &source.dump_sheet {
        Some(name) => dump.sheet_mut(name).ok_or_else(missing),
        None => dump.first_sheet_mut().ok_or_else(missing),
    }
}
