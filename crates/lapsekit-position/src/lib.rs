//! # lapsekit-position
//!
//! Incremental machine-state tracking for 3D printer G-code.
//!
//! The [`PositionTracker`] consumes parsed lines in file order and maintains:
//! - Absolute machine coordinates, feed rate, units, and axis modes
//! - Per-extruder extrusion and retraction state
//! - Layer number, current slicer feature, and suppressed regions
//! - A bounded history of earlier states for lookback
//!
//! Out-of-bounds moves and unknown tools are reported as constraint
//! violations and never stop the tracker.

pub mod args;
pub mod extruder;
pub mod history;
pub mod position;
pub mod tracker;

pub use args::PositionArgs;
pub use extruder::{ExtruderState, RetractionState};
pub use history::PositionHistory;
pub use position::{HomedAxes, Position};
pub use tracker::{PositionTracker, TrackerUpdate};
