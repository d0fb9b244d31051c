//! Data models for axes, coordinates, and machine limits
//!
//! This module provides:
//! - Logical axis identifiers (X, Y, Z, E)
//! - Absolute/relative axis modes and length units
//! - Cartesian coordinates with distance helpers
//! - Per-axis bounds and the machine bounding box

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used when comparing coordinates in millimetres
pub const COORDINATE_EPSILON: f64 = 1e-6;

/// Logical machine axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
    /// Extruder axis
    E,
}

impl Axis {
    /// The G-code parameter letter of this axis
    pub fn letter(&self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::E => 'E',
        }
    }

    /// The three Cartesian axes in order
    pub fn cartesian() -> [Axis; 3] {
        [Axis::X, Axis::Y, Axis::Z]
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Absolute or relative interpretation of axis values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    /// Values are target coordinates (G90 / M82)
    #[default]
    Absolute,
    /// Values are offsets from the current coordinate (G91 / M83)
    Relative,
}

impl AxisMode {
    /// Check if this mode is relative
    pub fn is_relative(&self) -> bool {
        matches!(self, AxisMode::Relative)
    }
}

impl fmt::Display for AxisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisMode::Absolute => write!(f, "absolute"),
            AxisMode::Relative => write!(f, "relative"),
        }
    }
}

/// Length units of incoming G-code values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Millimetres (G21)
    #[default]
    Millimeters,
    /// Inches (G20)
    Inches,
}

impl Units {
    /// Convert a value expressed in these units to millimetres
    pub fn to_mm(&self, value: f64) -> f64 {
        match self {
            Units::Millimeters => value,
            Units::Inches => value * 25.4,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::Millimeters => write!(f, "mm"),
            Units::Inches => write!(f, "in"),
        }
    }
}

/// Cartesian coordinates in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Coordinates {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
}

impl Coordinates {
    /// Create coordinates from X, Y, Z
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        debug_assert!(
            x.is_finite() && y.is_finite() && z.is_finite(),
            "Coordinates must be finite: x={x}, y={y}, z={z}"
        );
        Self { x, y, z }
    }

    /// Value of a Cartesian axis (E has no Cartesian coordinate)
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => Some(self.x),
            Axis::Y => Some(self.y),
            Axis::Z => Some(self.z),
            Axis::E => None,
        }
    }

    /// Euclidean distance in three dimensions
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Compare two coordinates within [`COORDINATE_EPSILON`]
    pub fn approx_eq(&self, other: &Coordinates) -> bool {
        (self.x - other.x).abs() < COORDINATE_EPSILON
            && (self.y - other.y).abs() < COORDINATE_EPSILON
            && (self.z - other.z).abs() < COORDINATE_EPSILON
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{:.3} Y:{:.3} Z:{:.3}", self.x, self.y, self.z)
    }
}

/// Inclusive range an axis may occupy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    /// Lowest reachable coordinate
    pub min: f64,
    /// Highest reachable coordinate
    pub max: f64,
}

impl AxisBounds {
    /// Create bounds from min and max
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Check if a value lies within the bounds (with tolerance)
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min - COORDINATE_EPSILON && value <= self.max + COORDINATE_EPSILON
    }

    /// Clamp a value into the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Width of the range
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Coordinate at `percent` of the range (0 = min, 100 = max)
    pub fn at_percent(&self, percent: f64) -> f64 {
        self.min + self.span() * percent / 100.0
    }

    /// Check that the bounds are finite and not inverted
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Bounding box of the printable volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineBounds {
    /// X-axis limits
    pub x: AxisBounds,
    /// Y-axis limits
    pub y: AxisBounds,
    /// Z-axis limits
    pub z: AxisBounds,
}

impl MachineBounds {
    /// Create a bounding box from the origin to the given maxima
    pub fn from_size(x_max: f64, y_max: f64, z_max: f64) -> Self {
        Self {
            x: AxisBounds::new(0.0, x_max),
            y: AxisBounds::new(0.0, y_max),
            z: AxisBounds::new(0.0, z_max),
        }
    }

    /// Bounds of a Cartesian axis
    pub fn axis(&self, axis: Axis) -> Option<&AxisBounds> {
        match axis {
            Axis::X => Some(&self.x),
            Axis::Y => Some(&self.y),
            Axis::Z => Some(&self.z),
            Axis::E => None,
        }
    }

    /// Check if the coordinates lie inside the box
    pub fn contains(&self, point: &Coordinates) -> bool {
        self.x.contains(point.x) && self.y.contains(point.y) && self.z.contains(point.z)
    }

    /// First axis of `point` that lies outside the box
    pub fn first_violation(&self, point: &Coordinates) -> Option<(Axis, f64, AxisBounds)> {
        Axis::cartesian().into_iter().find_map(|axis| {
            let bounds = *self.axis(axis)?;
            let value = point.get(axis)?;
            (!bounds.contains(value)).then_some((axis, value, bounds))
        })
    }
}

impl Default for MachineBounds {
    fn default() -> Self {
        Self::from_size(250.0, 210.0, 210.0)
    }
}
