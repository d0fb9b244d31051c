//! lapsekit Settings Crate
//!
//! Loads, validates, and saves job configuration files.

pub mod config;
pub mod error;

pub use config::{ConfigFormat, JobSettings, LoggingSettings, DEFAULT_FILE_NAME};
pub use error::{SettingsError, SettingsResult};
