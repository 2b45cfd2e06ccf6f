//! CLI Exit Code Registry
//!
//! Single source of truth for `capsync` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (unspecified)                              |
//! | 2    | Usage error (bad args, confirmation refused)             |
//! | 3    | One or more passes aborted on duplicate primary keys     |
//! | 5    | I/O error (file or sheet missing, save failed)           |
//! | 6    | Invalid config                                           |

use capsync_recon::SyncError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, or a destructive command run without confirmation.
pub const EXIT_USAGE: u8 = 2;

/// Duplicate keys in a dump or destination sheet; that pass was skipped.
/// Other passes still ran and the destination was still saved.
pub const EXIT_DUPLICATE_KEYS: u8 = 3;

/// A dump or destination file (or sheet) could not be opened, or saving failed.
/// No pass has run when this is returned for a load failure.
pub const EXIT_IO: u8 = 5;

/// Config file could not be parsed or failed validation.
pub const EXIT_CONFIG: u8 = 6;

pub fn sync_exit_code(err: &SyncError) -> u8 {
    match err {
        SyncError::ConfigParse(_) | SyncError::ConfigValidation(_) => EXIT_CONFIG,
        SyncError::MissingSheet { .. } | SyncError::Io(_) => EXIT_IO,
        SyncError::DuplicateKeys { .. } => EXIT_DUPLICATE_KEYS,
    }
}
