//! Error types for the settings crate.
//!
//! Loading and saving a job configuration can fail on I/O, on either file
//! format, or on validation of the loaded bundle.

use std::io;

use lapsekit_core::ConfigurationError;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The configuration file could not be saved.
    #[error("Failed to save settings to {path}: {reason}")]
    SaveError { path: String, reason: String },

    /// The configuration directory could not be found.
    #[error("Config directory error: {0}")]
    ConfigDirectory(String),

    /// The file extension is neither `.json` nor `.toml`.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// The loaded bundle failed validation.
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ConfigurationError),
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::UnsupportedFormat("yaml".to_string());
        assert_eq!(err.to_string(), "Unsupported config format: yaml");

        let err = SettingsError::ConfigDirectory("no home".to_string());
        assert_eq!(err.to_string(), "Config directory error: no home");

        let err = SettingsError::SaveError {
            path: "job.toml".to_string(),
            reason: "read-only".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to save settings to job.toml: read-only");
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigurationError::new("position.num_extruders", "must be at least 1");
        let settings_err: SettingsError = config_err.into();
        assert!(matches!(settings_err, SettingsError::Validation(_)));

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let settings_err: SettingsError = io_err.into();
        assert!(matches!(settings_err, SettingsError::IoError(_)));
    }
}
