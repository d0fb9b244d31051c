//! Tracker configuration

use serde::{Deserialize, Serialize};

use lapsekit_core::{AxisMode, ConfigurationError, Coordinates, MachineBounds};

/// Position and extruder tracking configuration
///
/// Supplied once per job and never mutated while lines are processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionArgs {
    /// Printable volume
    pub bounds: MachineBounds,
    /// Coordinates reached by `G28`
    pub home: Coordinates,
    /// Number of extruders (tool indices `0..num_extruders`)
    pub num_extruders: usize,
    /// Retraction length at which the extruder counts as retracted (mm)
    pub retraction_threshold: f64,
    /// Length retracted by `G10` and restored by `G11` (mm)
    pub firmware_retraction_length: f64,
    /// `G90`/`G91` also switch the extrusion mode
    pub g90_influences_extruder: bool,
    /// Positioning mode at job start
    pub initial_positioning: AxisMode,
    /// Extrusion mode at job start
    pub initial_extrusion: AxisMode,
    /// Height increase above the current layer that starts a new layer (mm)
    pub layer_change_threshold: f64,
    /// Number of earlier states kept for lookback
    pub history_size: usize,
}

impl Default for PositionArgs {
    fn default() -> Self {
        Self {
            bounds: MachineBounds::default(),
            home: Coordinates::default(),
            num_extruders: 1,
            retraction_threshold: 0.5,
            firmware_retraction_length: 0.8,
            g90_influences_extruder: false,
            initial_positioning: AxisMode::Absolute,
            initial_extrusion: AxisMode::Absolute,
            layer_change_threshold: 0.0,
            history_size: 8,
        }
    }
}

impl PositionArgs {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (field, bounds) in [
            ("position.bounds.x", &self.bounds.x),
            ("position.bounds.y", &self.bounds.y),
            ("position.bounds.z", &self.bounds.z),
        ] {
            if !bounds.is_valid() {
                return Err(ConfigurationError::new(
                    field,
                    format!("invalid range {}..{}", bounds.min, bounds.max),
                ));
            }
        }

        if ![self.home.x, self.home.y, self.home.z]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ConfigurationError::new("position.home", "must be finite"));
        }

        if self.num_extruders == 0 {
            return Err(ConfigurationError::new(
                "position.num_extruders",
                "at least one extruder is required",
            ));
        }

        if !(self.retraction_threshold.is_finite() && self.retraction_threshold > 0.0) {
            return Err(ConfigurationError::new(
                "position.retraction_threshold",
                "must be positive",
            ));
        }

        if !(self.firmware_retraction_length.is_finite() && self.firmware_retraction_length >= 0.0)
        {
            return Err(ConfigurationError::new(
                "position.firmware_retraction_length",
                "must not be negative",
            ));
        }

        if !(self.layer_change_threshold.is_finite() && self.layer_change_threshold >= 0.0) {
            return Err(ConfigurationError::new(
                "position.layer_change_threshold",
                "must not be negative",
            ));
        }

        if self.history_size == 0 {
            return Err(ConfigurationError::new(
                "position.history_size",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapsekit_core::AxisBounds;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PositionArgs::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut args = PositionArgs::default();
        args.bounds.y = AxisBounds::new(10.0, -10.0);
        let err = args.validate().unwrap_err();
        assert_eq!(err.field, "position.bounds.y");
    }

    #[test]
    fn test_zero_extruders_rejected() {
        let args = PositionArgs {
            num_extruders: 0,
            ..Default::default()
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_threshold_and_history_rejected() {
        let args = PositionArgs {
            retraction_threshold: 0.0,
            ..Default::default()
        };
        assert!(args.validate().is_err());

        let args = PositionArgs {
            history_size: 0,
            ..Default::default()
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let args: PositionArgs = serde_json::from_str(r#"{"num_extruders": 2}"#).unwrap();
        assert_eq!(args.num_extruders, 2);
        assert_eq!(args.history_size, 8);
    }
}
