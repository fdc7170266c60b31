//! Settings file loading
//!
//! Reads the mover settings from a TOML file whose keys are the PascalCase
//! setting names:
//!
//! ```toml
//! SourceDirectory = "/srv/scans/incoming"
//! DestinationDirectory = "/srv/scans/archive"
//! ResetPermissionsAfterMove = "true"
//! LogDirectory = "/var/log/dateshelf"
//! ```

use dateshelf_core::Settings;
use std::path::Path;
use thiserror::Error;

const RESET_PERMISSIONS_KEY: &str = "ResetPermissionsAfterMove";

/// Settings file error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Load settings from a TOML file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_settings(&contents)
}

/// Parse settings from TOML text
///
/// A bare TOML boolean for `ResetPermissionsAfterMove` is accepted and turned
/// into its text form; every other value is passed on for validation as is.
pub fn parse_settings(contents: &str) -> Result<Settings, ConfigError> {
    let mut table: toml::Table = contents.parse()?;
    if let Some(toml::Value::Boolean(flag)) = table.get(RESET_PERMISSIONS_KEY) {
        let flag = flag.to_string();
        table.insert(RESET_PERMISSIONS_KEY.to_string(), toml::Value::String(flag));
    }
    Ok(toml::Value::Table(table).try_into()?)
}
