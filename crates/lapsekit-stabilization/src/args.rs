//! Job configuration bundles
//!
//! Every bundle deserializes with defaults for missing fields and is
//! validated once before the first line of a job is processed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use lapsekit_core::{AxisBounds, ConfigurationError, Coordinates, MachineBounds};
use lapsekit_parser::{CommandGrammar, CommandRule, CommentArgs, FeatureType};
use lapsekit_position::PositionArgs;

/// Shape of a position restriction in the XY plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum RestrictionShape {
    /// Axis-aligned rectangle between two corners
    Rect {
        /// First corner X
        x1: f64,
        /// First corner Y
        y1: f64,
        /// Opposite corner X
        x2: f64,
        /// Opposite corner Y
        y2: f64,
    },
    /// Circle around a centre
    Circle {
        /// Centre X
        x: f64,
        /// Centre Y
        y: f64,
        /// Radius
        r: f64,
    },
}

impl RestrictionShape {
    /// Check if an XY point lies inside the shape (edges included)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match *self {
            RestrictionShape::Rect { x1, y1, x2, y2 } => {
                x >= x1.min(x2) && x <= x1.max(x2) && y >= y1.min(y2) && y <= y1.max(y2)
            }
            RestrictionShape::Circle { x: cx, y: cy, r } => {
                let (dx, dy) = (x - cx, y - cy);
                dx * dx + dy * dy <= r * r
            }
        }
    }

    fn is_valid(&self) -> bool {
        match *self {
            RestrictionShape::Rect { x1, y1, x2, y2 } => {
                [x1, y1, x2, y2].iter().all(|v| v.is_finite())
            }
            RestrictionShape::Circle { x, y, r } => {
                x.is_finite() && y.is_finite() && r.is_finite() && r > 0.0
            }
        }
    }
}

/// Whether a restriction requires or forbids positions inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionKind {
    /// Snapshots only inside one of the required areas
    Required,
    /// No snapshot inside this area
    Forbidden,
}

/// An area of the bed where snapshots are required or forbidden
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRestriction {
    /// Required or forbidden
    pub kind: RestrictionKind,
    /// Area
    #[serde(flatten)]
    pub shape: RestrictionShape,
}

/// Trigger eligibility configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TriggerArgs {
    /// Accept positions where the extruder is not retracted
    pub ignore_retraction: bool,
    /// Travel moves faster than this (mm/min) are not eligible
    pub max_travel_feedrate: Option<f64>,
    /// Slicer features during which no snapshot is taken
    pub excluded_features: Vec<FeatureType>,
    /// Required and forbidden areas
    pub restrictions: Vec<PositionRestriction>,
}

impl TriggerArgs {
    /// Check an XY point against the restrictions
    pub fn allows(&self, x: f64, y: f64) -> bool {
        let mut required = self
            .restrictions
            .iter()
            .filter(|r| r.kind == RestrictionKind::Required)
            .peekable();
        let inside_required =
            required.peek().is_none() || required.any(|r| r.shape.contains(x, y));

        inside_required
            && !self
                .restrictions
                .iter()
                .any(|r| r.kind == RestrictionKind::Forbidden && r.shape.contains(x, y))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(feedrate) = self.max_travel_feedrate {
            if !(feedrate.is_finite() && feedrate > 0.0) {
                return Err(ConfigurationError::new(
                    "trigger.max_travel_feedrate",
                    "must be positive",
                ));
            }
        }
        for (i, restriction) in self.restrictions.iter().enumerate() {
            if !restriction.shape.is_valid() {
                return Err(ConfigurationError::new(
                    format!("trigger.restrictions[{}]", i),
                    "shape must be finite with a positive radius",
                ));
            }
        }
        Ok(())
    }
}

/// Which stabilization strategy runs the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// One snapshot per layer at the best candidate
    #[default]
    Layer,
    /// Snapshots whenever the minimum interval has passed
    Gcode,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "layer" => Ok(Self::Layer),
            "gcode" => Ok(Self::Gcode),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// How the layer strategy ranks candidates
///
/// Retracted candidates always rank above candidates accepted with
/// retraction ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayerSelection {
    /// Shortest travel to the parking position, then [`TieBreak`]
    #[default]
    MinimalTravel,
    /// Position in the layer only, by [`TieBreak`]
    Earliest,
}

/// Order among otherwise equal candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Earlier line wins
    #[default]
    Earliest,
    /// Later line wins
    Latest,
}

/// Minimum spacing between fine-grained snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinimumInterval {
    /// Estimated print time
    Seconds(f64),
    /// Travelled distance
    Millimeters(f64),
}

impl Default for MinimumInterval {
    fn default() -> Self {
        MinimumInterval::Seconds(10.0)
    }
}

/// Parking coordinate for one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilizationAxis {
    /// Absolute machine coordinate (mm)
    Fixed(f64),
    /// Percent of the axis range (0 = min, 100 = max)
    Relative(f64),
    /// The axis stays where it is
    Disabled,
}

impl StabilizationAxis {
    /// Resolve against the axis bounds; `None` when disabled
    pub fn resolve(&self, bounds: &AxisBounds) -> Option<f64> {
        match *self {
            StabilizationAxis::Fixed(value) => Some(value),
            StabilizationAxis::Relative(percent) => Some(bounds.at_percent(percent)),
            StabilizationAxis::Disabled => None,
        }
    }

    fn validate(&self, field: &str, bounds: &AxisBounds) -> Result<(), ConfigurationError> {
        match *self {
            StabilizationAxis::Fixed(value) if !bounds.contains(value) || !value.is_finite() => {
                Err(ConfigurationError::new(
                    field,
                    format!(
                        "{} is outside the axis range {}..{}",
                        value, bounds.min, bounds.max
                    ),
                ))
            }
            StabilizationAxis::Relative(percent)
                if !(percent.is_finite() && (0.0..=100.0).contains(&percent)) =>
            {
                Err(ConfigurationError::new(
                    field,
                    format!("{}% is outside 0..=100", percent),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Stabilization strategy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationArgs {
    /// Strategy in use
    pub strategy: StrategyKind,
    /// X parking coordinate
    pub x: StabilizationAxis,
    /// Y parking coordinate
    pub y: StabilizationAxis,
    /// Z parking coordinate
    pub z: StabilizationAxis,
    /// Layer strategy ranking
    pub layer_selection: LayerSelection,
    /// Order among equal candidates
    pub tie_break: TieBreak,
    /// Distances closer than this count as equal (mm)
    pub distance_tolerance_mm: f64,
    /// Fine-grained strategy spacing
    pub minimum_interval: MinimumInterval,
}

impl Default for StabilizationArgs {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Layer,
            x: StabilizationAxis::Relative(50.0),
            y: StabilizationAxis::Relative(100.0),
            z: StabilizationAxis::Disabled,
            layer_selection: LayerSelection::MinimalTravel,
            tie_break: TieBreak::Earliest,
            distance_tolerance_mm: 0.01,
            minimum_interval: MinimumInterval::default(),
        }
    }
}

impl StabilizationArgs {
    /// Parking position reached from `from`; disabled axes keep `from`
    pub fn parking_target(&self, bounds: &MachineBounds, from: Coordinates) -> Coordinates {
        Coordinates {
            x: self.x.resolve(&bounds.x).unwrap_or(from.x),
            y: self.y.resolve(&bounds.y).unwrap_or(from.y),
            z: self.z.resolve(&bounds.z).unwrap_or(from.z),
        }
    }

    /// Validate the configuration against the machine bounds
    pub fn validate(&self, bounds: &MachineBounds) -> Result<(), ConfigurationError> {
        self.x.validate("stabilization.x", &bounds.x)?;
        self.y.validate("stabilization.y", &bounds.y)?;
        self.z.validate("stabilization.z", &bounds.z)?;

        if !(self.distance_tolerance_mm.is_finite() && self.distance_tolerance_mm >= 0.0) {
            return Err(ConfigurationError::new(
                "stabilization.distance_tolerance_mm",
                "must not be negative",
            ));
        }

        let (MinimumInterval::Seconds(value) | MinimumInterval::Millimeters(value)) =
            self.minimum_interval;
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigurationError::new(
                "stabilization.minimum_interval",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Snapshot plan configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotPlanArgs {
    /// Feed rate of travel and return moves (mm/min)
    pub travel_feedrate: f64,
    /// Z lift before parking (mm)
    pub lift_height_mm: Option<f64>,
    /// Settling pause before the camera fires (ms)
    pub pause_ms: u64,
    /// Command that fires the camera
    pub camera_command: String,
    /// Command sent after the camera fired
    pub resume_command: Option<String>,
}

impl Default for SnapshotPlanArgs {
    fn default() -> Self {
        Self {
            travel_feedrate: 6000.0,
            lift_height_mm: None,
            pause_ms: 250,
            camera_command: "M240".to_string(),
            resume_command: None,
        }
    }
}

impl SnapshotPlanArgs {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.travel_feedrate.is_finite() && self.travel_feedrate > 0.0) {
            return Err(ConfigurationError::new(
                "snapshot.travel_feedrate",
                "must be positive",
            ));
        }
        if let Some(lift) = self.lift_height_mm {
            if !(lift.is_finite() && lift >= 0.0) {
                return Err(ConfigurationError::new(
                    "snapshot.lift_height_mm",
                    "must not be negative",
                ));
            }
        }
        if self.camera_command.trim().is_empty() {
            return Err(ConfigurationError::new(
                "snapshot.camera_command",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// What happens to a line that fails to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Abort the job
    Strict,
    /// Record the error and skip the line
    #[default]
    Permissive,
}

/// Everything a job needs, supplied once at job start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GcodeProcessorArgs {
    /// Tracker configuration
    pub position: PositionArgs,
    /// Comment processing
    pub comments: CommentArgs,
    /// Trigger eligibility
    pub trigger: TriggerArgs,
    /// Strategy selection and tuning
    pub stabilization: StabilizationArgs,
    /// Plan assembly
    pub snapshot: SnapshotPlanArgs,
    /// Malformed line handling
    pub parse_policy: ParsePolicy,
    /// Extra or overriding dialect rules by opcode
    pub commands: BTreeMap<String, CommandRule>,
}

impl GcodeProcessorArgs {
    /// Validate every bundle
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.position.validate()?;
        self.comments.validate()?;
        self.trigger.validate()?;
        self.stabilization.validate(&self.position.bounds)?;
        self.snapshot.validate()?;
        for opcode in self.commands.keys() {
            if opcode.trim().is_empty() {
                return Err(ConfigurationError::new(
                    "commands",
                    "opcode must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// The standard dialect table extended with [`commands`](Self::commands)
    pub fn grammar(&self) -> CommandGrammar {
        self.commands
            .iter()
            .fold(CommandGrammar::standard(), |grammar, (opcode, rule)| {
                grammar.with_rule(opcode, rule.clone())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GcodeProcessorArgs::default().validate().is_ok());
    }

    #[test]
    fn test_parking_target() {
        let args = StabilizationArgs::default();
        let bounds = MachineBounds::from_size(200.0, 200.0, 200.0);
        let target = args.parking_target(&bounds, Coordinates::new(10.0, 20.0, 3.0));
        assert_eq!(target, Coordinates::new(100.0, 200.0, 3.0));
    }

    #[test]
    fn test_parking_outside_bounds_rejected() {
        let mut args = GcodeProcessorArgs::default();
        args.stabilization.x = StabilizationAxis::Fixed(500.0);
        let err = args.validate().unwrap_err();
        assert_eq!(err.field, "stabilization.x");

        args.stabilization.x = StabilizationAxis::Relative(120.0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut args = GcodeProcessorArgs::default();
        args.snapshot.travel_feedrate = 0.0;
        assert!(args.validate().is_err());

        let mut args = GcodeProcessorArgs::default();
        args.snapshot.lift_height_mm = Some(-1.0);
        assert!(args.validate().is_err());

        let mut args = GcodeProcessorArgs::default();
        args.stabilization.minimum_interval = MinimumInterval::Millimeters(0.0);
        assert!(args.validate().is_err());

        let mut args = GcodeProcessorArgs::default();
        args.stabilization.distance_tolerance_mm = -0.1;
        assert!(args.validate().is_err());

        let mut args = GcodeProcessorArgs::default();
        args.comments.marker_prefix = String::new();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_restrictions() {
        let args = TriggerArgs {
            restrictions: vec![
                PositionRestriction {
                    kind: RestrictionKind::Required,
                    shape: RestrictionShape::Rect {
                        x1: 0.0,
                        y1: 0.0,
                        x2: 100.0,
                        y2: 100.0,
                    },
                },
                PositionRestriction {
                    kind: RestrictionKind::Forbidden,
                    shape: RestrictionShape::Circle {
                        x: 50.0,
                        y: 50.0,
                        r: 10.0,
                    },
                },
            ],
            ..Default::default()
        };
        assert!(args.allows(10.0, 10.0));
        assert!(!args.allows(50.0, 55.0));
        assert!(!args.allows(150.0, 10.0));
        assert!(TriggerArgs::default().allows(999.0, 999.0));
    }

    #[test]
    fn test_extra_commands_extend_grammar() {
        let mut args = GcodeProcessorArgs::default();
        args.commands
            .insert("M900".to_string(), CommandRule::letters("KLT"));
        let grammar = args.grammar();
        assert!(grammar.accepts("M900", 'K'));
        assert!(!grammar.accepts("M900", 'X'));
    }

    #[test]
    fn test_deserialize_tagged_values() {
        let json = r#"{
            "stabilization": {"strategy": "gcode", "x": {"fixed": 10.0}, "y": "disabled",
                              "minimum_interval": {"millimeters": 50.0}},
            "trigger": {"restrictions": [{"kind": "forbidden", "shape": "circle", "x": 1.0, "y": 2.0, "r": 3.0}]}
        }"#;
        let args: GcodeProcessorArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.stabilization.strategy, StrategyKind::Gcode);
        assert_eq!(args.stabilization.x, StabilizationAxis::Fixed(10.0));
        assert_eq!(args.stabilization.y, StabilizationAxis::Disabled);
        assert_eq!(
            args.stabilization.minimum_interval,
            MinimumInterval::Millimeters(50.0)
        );
        assert_eq!(args.trigger.restrictions.len(), 1);
        assert_eq!(args.snapshot, SnapshotPlanArgs::default());
    }
}
