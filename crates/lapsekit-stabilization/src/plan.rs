//! Snapshot plans

use serde::{Deserialize, Serialize};

use lapsekit_core::{AxisMode, Coordinates, Units};

use crate::trigger::TriggerPosition;

/// One step of a snapshot plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SnapshotPlanStep {
    /// Move to a coordinate
    Travel {
        /// Target coordinate
        target: Coordinates,
        /// Feed rate (mm/min)
        feedrate: f64,
    },
    /// Wait for the machine to settle
    Pause {
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// Fire the camera
    TriggerCamera,
    /// Hand control back to the print
    Resume,
    /// Move back to the pre-snapshot coordinate
    Return {
        /// Pre-snapshot coordinate
        target: Coordinates,
        /// Pre-snapshot feed rate (mm/min)
        feedrate: f64,
    },
}

/// Machine state immediately before a plan starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanState {
    /// Head position
    pub position: Coordinates,
    /// Feed rate (mm/min, 0 when never set)
    pub feedrate: f64,
    /// XYZ positioning mode
    pub positioning: AxisMode,
    /// E mode
    pub extrusion: AxisMode,
    /// Input units
    pub units: Units,
    /// `G90`/`G91` also switch the extrusion mode on this machine
    pub g90_influences_extruder: bool,
}

/// Ordered steps taking one snapshot and restoring the machine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPlan {
    /// Trigger the plan was built for
    pub trigger: TriggerPosition,
    /// Steps in execution order
    pub steps: Vec<SnapshotPlanStep>,
    /// State the plan must restore
    pub initial: PlanState,
}

impl SnapshotPlan {
    /// Line after which the plan is spliced
    pub fn line_index(&self) -> usize {
        self.trigger.line_index
    }

    /// Targets of every travel step
    pub fn travel_targets(&self) -> impl Iterator<Item = &Coordinates> {
        self.steps.iter().filter_map(|step| match step {
            SnapshotPlanStep::Travel { target, .. } => Some(target),
            _ => None,
        })
    }

    /// Target and feed rate of the return step
    pub fn return_state(&self) -> Option<(Coordinates, f64)> {
        self.steps.iter().rev().find_map(|step| match step {
            SnapshotPlanStep::Return { target, feedrate } => Some((*target, *feedrate)),
            _ => None,
        })
    }
}

impl std::fmt::Display for SnapshotPlanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotPlanStep::Travel { target, feedrate } => {
                write!(f, "travel to {} at F{:.0}", target, feedrate)
            }
            SnapshotPlanStep::Pause { duration_ms } => write!(f, "pause {} ms", duration_ms),
            SnapshotPlanStep::TriggerCamera => write!(f, "trigger camera"),
            SnapshotPlanStep::Resume => write!(f, "resume"),
            SnapshotPlanStep::Return { target, feedrate } => {
                write!(f, "return to {} at F{:.0}", target, feedrate)
            }
        }
    }
}
