//! Snapshot plan assembly
//!
//! Turns a chosen trigger into an ordered step sequence: optional lift,
//! travel to the parking position, settling pause, camera trigger, resume,
//! and a return to the exact pre-snapshot coordinate and feed rate.

use lapsekit_core::{
    ConstraintViolation, Coordinates, MachineBounds, ViolationKind, COORDINATE_EPSILON,
};

use crate::args::{SnapshotPlanArgs, StabilizationArgs};
use crate::plan::{PlanState, SnapshotPlan, SnapshotPlanStep};
use crate::trigger::TriggerPosition;

/// Builds snapshot plans from chosen triggers
#[derive(Debug, Clone)]
pub struct SnapshotPlanAssembler {
    stabilization: StabilizationArgs,
    snapshot: SnapshotPlanArgs,
    bounds: MachineBounds,
    g90_influences_extruder: bool,
}

impl SnapshotPlanAssembler {
    /// Create an assembler
    pub fn new(
        stabilization: StabilizationArgs,
        snapshot: SnapshotPlanArgs,
        bounds: MachineBounds,
        g90_influences_extruder: bool,
    ) -> Self {
        Self {
            stabilization,
            snapshot,
            bounds,
            g90_influences_extruder,
        }
    }

    /// Plan configuration in use
    pub fn snapshot_args(&self) -> &SnapshotPlanArgs {
        &self.snapshot
    }

    /// Build the plan for `trigger`
    ///
    /// Fails with a constraint violation when a travel step would leave the
    /// machine bounds; no plan is produced in that case.
    pub fn assemble(&self, trigger: TriggerPosition) -> Result<SnapshotPlan, ConstraintViolation> {
        let position = &trigger.position;
        let start = position.coordinates();
        let feedrate = self.snapshot.travel_feedrate;
        let mut steps = Vec::new();
        let mut cursor = start;

        if let Some(lift) = self.snapshot.lift_height_mm {
            let z = self.bounds.z.clamp(start.z + lift);
            if z - start.z > COORDINATE_EPSILON {
                cursor.z = z;
                steps.push(SnapshotPlanStep::Travel {
                    target: cursor,
                    feedrate,
                });
            }
        }

        // Parking never moves the head down toward the part
        let mut parking = self.stabilization.parking_target(&self.bounds, cursor);
        parking.z = parking.z.max(cursor.z);
        if !parking.approx_eq(&cursor) {
            steps.push(SnapshotPlanStep::Travel {
                target: parking,
                feedrate,
            });
        }

        for step in &steps {
            if let SnapshotPlanStep::Travel { target, .. } = step {
                self.check_bounds(trigger.line_index, target)?;
            }
        }

        steps.push(SnapshotPlanStep::Pause {
            duration_ms: self.snapshot.pause_ms,
        });
        steps.push(SnapshotPlanStep::TriggerCamera);
        steps.push(SnapshotPlanStep::Resume);
        steps.push(SnapshotPlanStep::Return {
            target: start,
            feedrate: position.f,
        });

        Ok(SnapshotPlan {
            trigger,
            steps,
            initial: PlanState {
                position: start,
                feedrate: position.f,
                positioning: position.positioning,
                extrusion: position.extrusion,
                units: position.units,
                g90_influences_extruder: self.g90_influences_extruder,
            },
        })
    }

    fn check_bounds(
        &self,
        line_index: usize,
        target: &Coordinates,
    ) -> Result<(), ConstraintViolation> {
        match self.bounds.first_violation(target) {
            Some((axis, value, bounds)) => Err(ConstraintViolation::new(
                line_index,
                ViolationKind::PlanOutOfBounds {
                    axis,
                    value,
                    min: bounds.min,
                    max: bounds.max,
                },
            )),
            None => Ok(()),
        }
    }
}
