//! Job configuration files
//!
//! A [`JobSettings`] file carries the processor bundle plus the CLI's logging
//! preferences. The format follows the file extension: `.json` or `.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lapsekit_stabilization::GcodeProcessorArgs;

use crate::error::{SettingsError, SettingsResult};

/// File name used under the platform config directory
pub const DEFAULT_FILE_NAME: &str = "job.toml";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Format chosen by the extension of `path`
    pub fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(ConfigFormat::Toml),
            Some(ext) => Err(SettingsError::UnsupportedFormat(ext.to_string())),
            None => Err(SettingsError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Logging preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Everything stored in a job configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobSettings {
    /// Processor configuration
    pub processor: GcodeProcessorArgs,
    /// Logging preferences
    pub logging: LoggingSettings,
}

impl JobSettings {
    /// Default location: `<config dir>/lapsekit/job.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("lapsekit").join(DEFAULT_FILE_NAME))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory on this platform".into())
            })
    }

    /// Load settings from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_str_with_format(&content, format)?;
        settings.validate()?;
        tracing::debug!("Loaded job settings from {}", path.display());
        Ok(settings)
    }

    /// Parse settings text in the given format
    pub fn from_str_with_format(content: &str, format: ConfigFormat) -> SettingsResult<Self> {
        Ok(match format {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        })
    }

    /// Serialize settings in the given format
    pub fn to_string_with_format(&self, format: ConfigFormat) -> SettingsResult<String> {
        Ok(match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        })
    }

    /// Save settings to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let content = self.to_string_with_format(ConfigFormat::from_path(path)?)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::SaveError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::SaveError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Saved job settings to {}", path.display());
        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> SettingsResult<()> {
        self.processor.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapsekit_stabilization::{ParsePolicy, StrategyKind};

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/job.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("job.JSON")).unwrap(),
            ConfigFormat::Json
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("job.yaml")),
            Err(SettingsError::UnsupportedFormat(_))
        ));
        assert!(ConfigFormat::from_path(Path::new("job")).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            [processor]
            parse_policy = "strict"

            [processor.stabilization]
            strategy = "gcode"
        "#;
        let settings = JobSettings::from_str_with_format(text, ConfigFormat::Toml).unwrap();
        assert_eq!(settings.processor.parse_policy, ParsePolicy::Strict);
        assert_eq!(
            settings.processor.stabilization.strategy,
            StrategyKind::Gcode
        );
        assert_eq!(settings.logging, LoggingSettings::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let settings = JobSettings::default();
        let text = settings.to_string_with_format(ConfigFormat::Toml).unwrap();
        let back = JobSettings::from_str_with_format(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_invalid_bundle_rejected() {
        let mut settings = JobSettings::default();
        settings.processor.position.num_extruders = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Validation(_))
        ));
    }
}
