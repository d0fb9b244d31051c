//! Incremental position and extruder tracker
//!
//! Applies parsed lines in order and keeps the machine state the printer
//! would have after each one. Mode commands switch between absolute and
//! relative interpretation, motion commands move the head, and extrusion
//! deltas drive the per-extruder retraction state.
//!
//! Problems with the job itself (an axis leaving the machine bounds, a tool
//! that does not exist) are returned as constraint violations and tracking
//! continues. Only a broken internal invariant stops the tracker.

use lapsekit_core::{
    Axis, AxisMode, ConfigurationError, ConstraintViolation, InvariantFailure, Units,
    ViolationKind, COORDINATE_EPSILON,
};
use lapsekit_parser::{Annotation, Directive, ParsedCommand, ParsedLine};

use crate::args::PositionArgs;
use crate::extruder::ExtruderState;
use crate::history::PositionHistory;
use crate::position::{HomedAxes, Position};

/// Non-fatal findings from applying one line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerUpdate {
    /// Constraint violations raised by the line
    pub violations: Vec<ConstraintViolation>,
}

impl TrackerUpdate {
    /// Check if the line applied cleanly
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Tracks position, modes, extrusion, and layers across a job
#[derive(Debug, Clone)]
pub struct PositionTracker {
    args: PositionArgs,
    current: Position,
    extruders: Vec<ExtruderState>,
    history: PositionHistory,
    layer_directive_pending: bool,
}

impl PositionTracker {
    /// Create a tracker from validated arguments
    pub fn new(args: PositionArgs) -> Result<Self, ConfigurationError> {
        args.validate()?;
        let history = PositionHistory::new(args.history_size);
        let mut tracker = Self {
            current: Position::default(),
            extruders: Vec::new(),
            history,
            layer_directive_pending: false,
            args,
        };
        tracker.reset();
        Ok(tracker)
    }

    /// Configuration in use
    pub fn args(&self) -> &PositionArgs {
        &self.args
    }

    /// State after the last applied line
    pub fn current(&self) -> &Position {
        &self.current
    }

    /// State of the active extruder
    pub fn extruder(&self) -> &ExtruderState {
        &self.extruders[self.current.tool]
    }

    /// State of every extruder
    pub fn extruders(&self) -> &[ExtruderState] {
        &self.extruders
    }

    /// Earlier states, newest last
    pub fn history(&self) -> &PositionHistory {
        &self.history
    }

    /// Return to the job-start state
    pub fn reset(&mut self) {
        self.current = Position {
            positioning: self.args.initial_positioning,
            extrusion: self.args.initial_extrusion,
            ..Default::default()
        };
        self.extruders = (0..self.args.num_extruders)
            .map(ExtruderState::new)
            .collect();
        self.history.clear();
        self.layer_directive_pending = false;
    }

    /// Apply one parsed line
    ///
    /// Every line advances the sequence number. Lines with a command or an
    /// annotation are also recorded in the history before they are applied.
    pub fn update(&mut self, line: &ParsedLine) -> Result<TrackerUpdate, InvariantFailure> {
        let command = line.command();
        if command.is_some() || !line.annotations.is_empty() {
            self.history.push(self.current, *self.extruder());
        }

        self.current.begin_line();
        self.current.sequence += 1;
        for extruder in &mut self.extruders {
            extruder.begin_command();
        }

        for annotation in &line.annotations {
            self.apply_annotation(*annotation);
        }

        let mut update = TrackerUpdate::default();
        if let Some(command) = command {
            self.apply_command(command, line.line_index, &mut update)?;
        }

        self.current.e = self.extruder().e;
        self.current.is_in_bounds = self.args.bounds.contains(&self.current.coordinates());
        Ok(update)
    }

    fn apply_annotation(&mut self, annotation: Annotation) {
        match annotation {
            Annotation::Directive(Directive::LayerChange) => {
                self.start_layer();
                self.layer_directive_pending = true;
            }
            Annotation::Directive(Directive::SuppressStart) => {
                self.current.snapshot_suppressed = true;
            }
            Annotation::Directive(Directive::SuppressEnd) => {
                self.current.snapshot_suppressed = false;
            }
            Annotation::Directive(Directive::TakeSnapshot) => {
                self.current.snapshot_requested = true;
            }
            Annotation::Feature(feature) => {
                self.current.feature = feature;
            }
        }
    }

    fn apply_command(
        &mut self,
        command: &ParsedCommand,
        line_index: usize,
        update: &mut TrackerUpdate,
    ) -> Result<(), InvariantFailure> {
        match command.command.as_str() {
            "G0" | "G1" | "G2" | "G3" => self.apply_move(command, line_index, update)?,
            "G10" if !command.has('P') && !command.has('L') => {
                let length = self.args.firmware_retraction_length;
                self.apply_firmware_retraction(-length, line_index)?;
            }
            "G11" => {
                let length = self.args.firmware_retraction_length;
                self.apply_firmware_retraction(length, line_index)?;
            }
            "G20" => self.current.units = Units::Inches,
            "G21" => self.current.units = Units::Millimeters,
            "G28" => self.apply_home(command),
            "G90" => self.set_positioning(AxisMode::Absolute),
            "G91" => self.set_positioning(AxisMode::Relative),
            "G92" => self.apply_set_position(command),
            "M82" => self.current.extrusion = AxisMode::Absolute,
            "M83" => self.current.extrusion = AxisMode::Relative,
            _ => {
                if let Some(tool) = command.tool_index() {
                    self.select_tool(tool, line_index, update);
                }
            }
        }
        Ok(())
    }

    fn set_positioning(&mut self, mode: AxisMode) {
        self.current.positioning = mode;
        if self.args.g90_influences_extruder {
            self.current.extrusion = mode;
        }
    }

    fn apply_move(
        &mut self,
        command: &ParsedCommand,
        line_index: usize,
        update: &mut TrackerUpdate,
    ) -> Result<(), InvariantFailure> {
        let units = self.current.units;
        let relative = self.current.positioning.is_relative();
        let before = self.current.coordinates();

        for axis in Axis::cartesian() {
            let Some(value) = command.number(axis.letter()) else {
                continue;
            };
            let value = units.to_mm(value);
            let (coordinate, homed) = self.axis_mut(axis);
            *coordinate = if relative { *coordinate + value } else { value };
            if !relative {
                *homed = true;
            }
            let (coordinate, homed) = (*coordinate, *homed);

            if homed {
                if let Some(bounds) = self.args.bounds.axis(axis) {
                    if !bounds.contains(coordinate) {
                        update.violations.push(ConstraintViolation::new(
                            line_index,
                            ViolationKind::AxisOutOfBounds {
                                axis,
                                value: coordinate,
                                min: bounds.min,
                                max: bounds.max,
                            },
                        ));
                    }
                }
            }
        }

        if let Some(feed) = command.number('F') {
            if feed > 0.0 {
                self.current.f = units.to_mm(feed);
            }
        }

        let mut e_delta = 0.0;
        if let Some(value) = command.number('E') {
            let value = units.to_mm(value);
            let threshold = self.args.retraction_threshold;
            let extruder = &mut self.extruders[self.current.tool];
            e_delta = match self.current.extrusion {
                AxisMode::Relative => value,
                AxisMode::Absolute => value - extruder.e,
            };
            extruder.apply_delta(e_delta, threshold, line_index)?;
        }

        let after = self.current.coordinates();
        let length = before.distance_to(&after);
        self.current.has_moved = length > COORDINATE_EPSILON;
        self.current.is_travel = self.current.has_moved && e_delta.abs() < COORDINATE_EPSILON;
        self.current.distance_mm += length;
        if self.current.f > 0.0 {
            self.current.print_time_s += length / (self.current.f / 60.0);
        }

        if self.extruder().is_extruding() {
            self.track_layer_height();
        }
        Ok(())
    }

    fn apply_firmware_retraction(
        &mut self,
        delta: f64,
        line_index: usize,
    ) -> Result<(), InvariantFailure> {
        let threshold = self.args.retraction_threshold;
        self.extruders[self.current.tool].apply_firmware(delta, threshold, line_index)
    }

    fn apply_home(&mut self, command: &ParsedCommand) {
        let named: Vec<Axis> = Axis::cartesian()
            .into_iter()
            .filter(|axis| command.has(axis.letter()))
            .collect();
        let axes = if named.is_empty() {
            Axis::cartesian().to_vec()
        } else {
            named
        };

        let before = self.current.coordinates();
        let home = self.args.home;
        for axis in axes {
            let target = home.get(axis).unwrap_or_default();
            let (coordinate, homed) = self.axis_mut(axis);
            *coordinate = target;
            *homed = true;
        }
        self.current.has_moved = !before.approx_eq(&self.current.coordinates());
        self.current.is_travel = self.current.has_moved;
    }

    fn apply_set_position(&mut self, command: &ParsedCommand) {
        let units = self.current.units;
        let bare = !Axis::cartesian().iter().any(|a| command.has(a.letter())) && !command.has('E');

        for axis in Axis::cartesian() {
            let value = if bare {
                Some(0.0)
            } else {
                command.number(axis.letter()).map(|v| units.to_mm(v))
            };
            if let Some(value) = value {
                let (coordinate, homed) = self.axis_mut(axis);
                *coordinate = value;
                *homed = true;
            }
        }

        let e = if bare {
            Some(0.0)
        } else {
            command.number('E').map(|v| units.to_mm(v))
        };
        if let Some(e) = e {
            self.extruders[self.current.tool].set_e(e);
        }
    }

    fn select_tool(&mut self, tool: usize, line_index: usize, update: &mut TrackerUpdate) {
        if tool >= self.extruders.len() {
            update.violations.push(ConstraintViolation::new(
                line_index,
                ViolationKind::UnknownTool {
                    requested: tool,
                    available: self.extruders.len(),
                },
            ));
            return;
        }
        if tool != self.current.tool {
            tracing::debug!("Tool change T{} -> T{} at line {}", self.current.tool, tool, line_index);
        }
        self.current.tool = tool;
    }

    /// Count a new layer when extruding above the current layer height
    fn track_layer_height(&mut self) {
        let z = self.current.z;
        if self.layer_directive_pending {
            self.layer_directive_pending = false;
            self.current.height = z;
            return;
        }

        let threshold = self.args.layer_change_threshold;
        if self.current.layer == 0 || z - self.current.height > threshold + COORDINATE_EPSILON {
            self.start_layer();
            self.current.height = z;
        }
    }

    fn start_layer(&mut self) {
        self.current.layer += 1;
        self.current.is_layer_change = true;
        tracing::debug!("Layer {} started", self.current.layer);
    }

    fn axis_mut(&mut self, axis: Axis) -> (&mut f64, &mut bool) {
        let Position { x, y, z, homed, .. } = &mut self.current;
        let HomedAxes {
            x: hx,
            y: hy,
            z: hz,
        } = homed;
        match axis {
            Axis::X => (x, hx),
            Axis::Y => (y, hy),
            // E never reaches here; callers pass Cartesian axes only.
            Axis::Z | Axis::E => (z, hz),
        }
    }
}
