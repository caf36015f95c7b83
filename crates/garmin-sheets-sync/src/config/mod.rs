mod credentials;

pub use credentials::CredentialStore;

use crate::error::{GarminError, Result};
use std::path::{Path, PathBuf};

/// Directory name under the platform data directory
const DATA_DIR_NAME: &str = "garmin-sheets-sync";

/// Get the data directory path for storing tokens
/// Returns ~/.local/share/garmin-sheets-sync on Unix, ~/Library/Application Support/garmin-sheets-sync on macOS
pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|p| p.join(DATA_DIR_NAME))
        .ok_or_else(|| GarminError::config("Could not determine data directory"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
