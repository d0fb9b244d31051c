//! Render snapshot plans as G-code
//!
//! Plan coordinates are absolute millimetres, so the rendered block switches
//! to `G21`/`G90` when needed and switches back afterwards. Replaying the
//! block leaves position, feed rate, units, and both axis modes as they were.

use lapsekit_core::{AxisMode, Units};

use crate::args::SnapshotPlanArgs;
use crate::plan::{SnapshotPlan, SnapshotPlanStep};

/// Render a plan into G-code lines
pub fn render_gcode(plan: &SnapshotPlan, args: &SnapshotPlanArgs) -> Vec<String> {
    let initial = &plan.initial;
    let relative = initial.positioning == AxisMode::Relative;
    let inches = initial.units == Units::Inches;
    let mut lines = Vec::with_capacity(plan.steps.len() + 6);

    if inches {
        lines.push("G21".to_string());
    }
    if relative {
        lines.push("G90".to_string());
    }

    for step in &plan.steps {
        match step {
            SnapshotPlanStep::Travel { target, feedrate } => lines.push(format!(
                "G1 X{} Y{} Z{} F{}",
                target.x, target.y, target.z, feedrate
            )),
            SnapshotPlanStep::Pause { duration_ms } => {
                if *duration_ms > 0 {
                    lines.push(format!("G4 P{}", duration_ms));
                }
            }
            SnapshotPlanStep::TriggerCamera => lines.push(args.camera_command.trim().to_string()),
            SnapshotPlanStep::Resume => {
                if let Some(command) = &args.resume_command {
                    lines.push(command.trim().to_string());
                }
            }
            SnapshotPlanStep::Return { target, feedrate } => {
                lines.push(format!(
                    "G1 X{} Y{} F{}",
                    target.x, target.y, args.travel_feedrate
                ));
                lines.push(format!("G1 Z{}", target.z));
                if *feedrate > 0.0 {
                    lines.push(format!("G1 F{}", feedrate));
                }
            }
        }
    }

    if relative {
        lines.push("G91".to_string());
        // G91 just switched extrusion to relative as well.
        if initial.g90_influences_extruder && initial.extrusion == AxisMode::Absolute {
            lines.push("M82".to_string());
        }
    }
    if inches {
        lines.push("G20".to_string());
    }
    lines
}
