//! Per-extruder extrusion and retraction state

use serde::{Deserialize, Serialize};

use lapsekit_core::{InvariantFailure, COORDINATE_EPSILON};

/// Direction of the filament relative to the nozzle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetractionState {
    /// No filament is pulled back
    #[default]
    Extruding,
    /// Filament is pulled back, but less than the threshold
    Retracting,
    /// Filament is pulled back by at least the threshold
    Retracted,
    /// A retraction is being partially undone
    Deretracting,
}

/// Extrusion bookkeeping for one extruder
///
/// `extrusion_length`, `retraction_delta`, and `deretraction_length` describe
/// the most recent command only; the other fields are cumulative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtruderState {
    /// Extruder (tool) index
    pub index: usize,
    /// Logical E coordinate
    pub e: f64,
    /// Filament extruded by the last command (mm)
    pub extrusion_length: f64,
    /// Filament extruded since job start (mm)
    pub extrusion_length_total: f64,
    /// Filament currently pulled back (mm)
    pub retraction_length: f64,
    /// Filament pulled back by the last command (mm)
    pub retraction_delta: f64,
    /// Retraction undone by the last command (mm)
    pub deretraction_length: f64,
    /// Current retraction state
    pub state: RetractionState,
}

impl ExtruderState {
    /// Create an idle extruder
    pub fn new(index: usize) -> Self {
        Self {
            index,
            e: 0.0,
            extrusion_length: 0.0,
            extrusion_length_total: 0.0,
            retraction_length: 0.0,
            retraction_delta: 0.0,
            deretraction_length: 0.0,
            state: RetractionState::Extruding,
        }
    }

    /// Check if the extruder is fully retracted
    pub fn is_retracted(&self) -> bool {
        self.state == RetractionState::Retracted
    }

    /// Check if the last command pushed new filament out
    pub fn is_extruding(&self) -> bool {
        self.extrusion_length > 0.0
    }

    /// Clear the per-command fields before the next command
    pub(crate) fn begin_command(&mut self) {
        self.extrusion_length = 0.0;
        self.retraction_delta = 0.0;
        self.deretraction_length = 0.0;
    }

    /// Apply an E delta from a move
    pub(crate) fn apply_delta(
        &mut self,
        delta: f64,
        threshold: f64,
        line_index: usize,
    ) -> Result<(), InvariantFailure> {
        self.e += delta;
        self.apply_filament(delta, threshold, line_index)
    }

    /// Apply a firmware retraction (`G10`/`G11`) without moving the E coordinate
    pub(crate) fn apply_firmware(
        &mut self,
        delta: f64,
        threshold: f64,
        line_index: usize,
    ) -> Result<(), InvariantFailure> {
        // Firmware deretraction only restores what was pulled back.
        let delta = if delta > 0.0 {
            delta.min(self.retraction_length)
        } else {
            delta
        };
        self.apply_filament(delta, threshold, line_index)
    }

    /// Re-base the E coordinate (`G92 E`)
    pub(crate) fn set_e(&mut self, e: f64) {
        self.e = e;
    }

    fn apply_filament(
        &mut self,
        delta: f64,
        threshold: f64,
        line_index: usize,
    ) -> Result<(), InvariantFailure> {
        if delta < 0.0 {
            let pulled = -delta;
            self.retraction_length += pulled;
            self.retraction_delta = pulled;
            self.state = if self.retraction_length + COORDINATE_EPSILON >= threshold {
                RetractionState::Retracted
            } else {
                RetractionState::Retracting
            };
        } else if delta > 0.0 {
            let restored = delta.min(self.retraction_length);
            self.retraction_length -= restored;
            if self.retraction_length < COORDINATE_EPSILON {
                self.retraction_length = 0.0;
            }
            self.deretraction_length = restored;
            self.extrusion_length = delta - restored;
            self.extrusion_length_total += self.extrusion_length;
            self.state = if self.retraction_length > 0.0 {
                RetractionState::Deretracting
            } else {
                RetractionState::Extruding
            };
        }

        self.check(line_index)
    }

    fn check(&self, line_index: usize) -> Result<(), InvariantFailure> {
        if self.retraction_length < 0.0 || !self.retraction_length.is_finite() {
            return Err(InvariantFailure::new(
                line_index,
                format!(
                    "extruder {} retraction length is {}",
                    self.index, self.retraction_length
                ),
            ));
        }
        if self.extrusion_length_total < 0.0 || !self.extrusion_length_total.is_finite() {
            return Err(InvariantFailure::new(
                line_index,
                format!(
                    "extruder {} cumulative extrusion is {}",
                    self.index, self.extrusion_length_total
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(extruder: &mut ExtruderState, delta: f64) {
        extruder.begin_command();
        extruder.apply_delta(delta, 1.0, 0).unwrap();
    }

    #[test]
    fn test_retract_then_deretract_exactly() {
        let mut extruder = ExtruderState::new(0);

        step(&mut extruder, -2.0);
        assert_eq!(extruder.state, RetractionState::Retracted);
        assert_eq!(extruder.retraction_length, 2.0);

        step(&mut extruder, -1.0);
        assert_eq!(extruder.state, RetractionState::Retracted);
        assert_eq!(extruder.retraction_length, 3.0);

        step(&mut extruder, 3.0);
        assert_eq!(extruder.state, RetractionState::Extruding);
        assert_eq!(extruder.extrusion_length, 0.0);
        assert_eq!(extruder.deretraction_length, 3.0);
        assert_eq!(extruder.retraction_length, 0.0);
        assert_eq!(extruder.e, 0.0);
    }

    #[test]
    fn test_small_retraction_is_retracting() {
        let mut extruder = ExtruderState::new(0);
        step(&mut extruder, -0.4);
        assert_eq!(extruder.state, RetractionState::Retracting);
        assert!(!extruder.is_retracted());
    }

    #[test]
    fn test_partial_deretraction_and_excess() {
        let mut extruder = ExtruderState::new(0);
        step(&mut extruder, -2.0);
        step(&mut extruder, 0.5);
        assert_eq!(extruder.state, RetractionState::Deretracting);
        assert_eq!(extruder.retraction_length, 1.5);

        step(&mut extruder, 2.0);
        assert_eq!(extruder.state, RetractionState::Extruding);
        assert_eq!(extruder.extrusion_length, 0.5);
        assert_eq!(extruder.extrusion_length_total, 0.5);
    }

    #[test]
    fn test_zero_delta_keeps_state() {
        let mut extruder = ExtruderState::new(0);
        step(&mut extruder, -2.0);
        step(&mut extruder, 0.0);
        assert!(extruder.is_retracted());
        assert_eq!(extruder.retraction_delta, 0.0);
    }

    #[test]
    fn test_firmware_retraction_keeps_e() {
        let mut extruder = ExtruderState::new(0);
        extruder.set_e(12.0);
        extruder.apply_firmware(-0.8, 0.5, 0).unwrap();
        assert!(extruder.is_retracted());
        assert_eq!(extruder.e, 12.0);

        extruder.begin_command();
        extruder.apply_firmware(5.0, 0.5, 0).unwrap();
        assert_eq!(extruder.state, RetractionState::Extruding);
        assert_eq!(extruder.extrusion_length, 0.0);
    }

    #[test]
    fn test_non_finite_delta_is_invariant_failure() {
        let mut extruder = ExtruderState::new(0);
        let err = extruder.apply_delta(f64::NEG_INFINITY, 1.0, 9).unwrap_err();
        assert_eq!(err.line_index, 9);
    }
}
