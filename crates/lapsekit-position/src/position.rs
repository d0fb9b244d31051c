//! Machine position snapshot

use serde::{Deserialize, Serialize};

use lapsekit_core::{AxisMode, Coordinates, Units};
use lapsekit_parser::FeatureType;

/// Axes whose coordinate is known (homed or set absolutely)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HomedAxes {
    /// X is known
    pub x: bool,
    /// Y is known
    pub y: bool,
    /// Z is known
    pub z: bool,
}

impl HomedAxes {
    /// Check if every Cartesian axis is known
    pub fn is_known(&self) -> bool {
        self.x && self.y && self.z
    }
}

/// Machine state after one line has been applied
///
/// Positions are plain values; the tracker keeps the current one plus a
/// bounded history of earlier ones. All lengths are millimetres and feed
/// rates are millimetres per minute regardless of the active units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
    /// Feed rate (0 until the job sets one)
    pub f: f64,
    /// Logical E coordinate of the active extruder
    pub e: f64,
    /// XYZ positioning mode
    pub positioning: AxisMode,
    /// E mode
    pub extrusion: AxisMode,
    /// Input units
    pub units: Units,
    /// Active extruder index
    pub tool: usize,
    /// Current layer (0 until the first extrusion)
    pub layer: u32,
    /// Height of the current layer
    pub height: f64,
    /// Slicer feature being printed
    pub feature: FeatureType,
    /// Strictly increasing per processed line
    pub sequence: u64,
    /// Axes with a known coordinate
    pub homed: HomedAxes,
    /// This line started a new layer
    pub is_layer_change: bool,
    /// This line moved without extruding
    pub is_travel: bool,
    /// XYZ lies inside the machine bounds
    pub is_in_bounds: bool,
    /// This line changed XYZ
    pub has_moved: bool,
    /// Inside a suppressed region
    pub snapshot_suppressed: bool,
    /// This line carried a snapshot request directive
    pub snapshot_requested: bool,
    /// Estimated print time since job start (seconds)
    pub print_time_s: f64,
    /// Travelled distance since job start
    pub distance_mm: f64,
}

impl Position {
    /// XYZ as coordinates
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }

    /// Check if XYZ are known
    pub fn is_known(&self) -> bool {
        self.homed.is_known()
    }

    /// Clear the per-line flags before the next line
    pub(crate) fn begin_line(&mut self) {
        self.is_layer_change = false;
        self.is_travel = false;
        self.has_moved = false;
        self.snapshot_requested = false;
    }
}

impl Default for Position {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            f: 0.0,
            e: 0.0,
            positioning: AxisMode::Absolute,
            extrusion: AxisMode::Absolute,
            units: Units::Millimeters,
            tool: 0,
            layer: 0,
            height: 0.0,
            feature: FeatureType::Unknown,
            sequence: 0,
            homed: HomedAxes::default(),
            is_layer_change: false,
            is_travel: false,
            is_in_bounds: true,
            has_moved: false,
            snapshot_suppressed: false,
            snapshot_requested: false,
            print_time_s: 0.0,
            distance_mm: 0.0,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} F:{:.0} E:{:.4} T{} layer {}",
            self.coordinates(),
            self.f,
            self.e,
            self.tool,
            self.layer
        )
    }
}
