//! Trigger position evaluation
//!
//! After each line the evaluator decides whether the current instant is a
//! safe place to take a snapshot. The verdict depends only on the tracker
//! state and its bounded history, so replaying a job yields the same
//! verdicts.

use serde::{Deserialize, Serialize};

use lapsekit_position::{ExtruderState, Position, PositionTracker};

use crate::args::TriggerArgs;

/// Why a position was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    /// X, Y, or Z was never homed or set absolutely
    PositionUnknown,
    /// Nothing has been extruded yet
    NotPrinting,
    /// Outside the machine bounds
    OutOfBounds,
    /// Inside a suppressed region
    Suppressed,
    /// Printing an excluded slicer feature
    FeatureExcluded,
    /// Violates a required or forbidden area
    RestrictedArea,
    /// The extruder is not retracted
    NotRetracted,
    /// Travelling faster than allowed
    UnsafeTravelSpeed,
    /// Same XYZ as the previous candidate
    NoMovementSinceLastCandidate,
}

/// Why a position was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibleReason {
    /// The extruder is retracted
    Retracted,
    /// Retraction is not required
    RetractionIgnored,
}

/// Verdict for one candidate instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerVerdict {
    /// A snapshot may be taken here
    Eligible(EligibleReason),
    /// No snapshot here
    Ineligible(IneligibleReason),
}

impl TriggerVerdict {
    /// Check if the verdict allows a snapshot
    pub fn is_eligible(&self) -> bool {
        matches!(self, TriggerVerdict::Eligible(_))
    }

    /// Check if the verdict was accepted with the extruder retracted
    pub fn is_retracted(&self) -> bool {
        matches!(self, TriggerVerdict::Eligible(EligibleReason::Retracted))
    }

    /// Short human-readable reason
    pub fn description(&self) -> &'static str {
        match self {
            TriggerVerdict::Eligible(EligibleReason::Retracted) => "extruder retracted",
            TriggerVerdict::Eligible(EligibleReason::RetractionIgnored) => "retraction ignored",
            TriggerVerdict::Ineligible(reason) => match reason {
                IneligibleReason::PositionUnknown => "position unknown",
                IneligibleReason::NotPrinting => "not printing",
                IneligibleReason::OutOfBounds => "out of bounds",
                IneligibleReason::Suppressed => "suppressed by directive",
                IneligibleReason::FeatureExcluded => "excluded feature",
                IneligibleReason::RestrictedArea => "restricted area",
                IneligibleReason::NotRetracted => "extruder not retracted",
                IneligibleReason::UnsafeTravelSpeed => "unsafe travel speed",
                IneligibleReason::NoMovementSinceLastCandidate => {
                    "no movement since last candidate"
                }
            },
        }
    }
}

impl std::fmt::Display for TriggerVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_eligible() {
            "eligible"
        } else {
            "ineligible"
        };
        write!(f, "{} ({})", kind, self.description())
    }
}

/// A candidate instant with its verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerPosition {
    /// Line after which the snapshot would be taken
    pub line_index: usize,
    /// Machine state after the line
    pub position: Position,
    /// Active extruder after the line
    pub extruder: ExtruderState,
    /// Eligibility verdict
    pub verdict: TriggerVerdict,
}

impl TriggerPosition {
    /// Check if a snapshot may be taken here
    pub fn is_eligible(&self) -> bool {
        self.verdict.is_eligible()
    }
}

/// Shared eligibility check used by every strategy
#[derive(Debug, Clone)]
pub struct TriggerEvaluator {
    args: TriggerArgs,
}

impl TriggerEvaluator {
    /// Create an evaluator
    pub fn new(args: TriggerArgs) -> Self {
        Self { args }
    }

    /// Evaluate the tracker's current state as a candidate for `line_index`
    pub fn evaluate(&self, line_index: usize, tracker: &PositionTracker) -> TriggerPosition {
        let position = *tracker.current();
        let extruder = *tracker.extruder();

        let verdict = match self.check(&position, &extruder) {
            Err(reason) => TriggerVerdict::Ineligible(reason),
            Ok(eligible) => {
                let previous = tracker
                    .history()
                    .iter_newest_first()
                    .find(|(p, e)| self.check(p, e).is_ok());
                match previous {
                    Some((p, _)) if p.coordinates().approx_eq(&position.coordinates()) => {
                        TriggerVerdict::Ineligible(IneligibleReason::NoMovementSinceLastCandidate)
                    }
                    _ => TriggerVerdict::Eligible(eligible),
                }
            }
        };

        TriggerPosition {
            line_index,
            position,
            extruder,
            verdict,
        }
    }

    /// Every check except the movement lookback, first failure wins
    fn check(
        &self,
        position: &Position,
        extruder: &ExtruderState,
    ) -> Result<EligibleReason, IneligibleReason> {
        if !position.is_known() {
            return Err(IneligibleReason::PositionUnknown);
        }
        if position.layer == 0 {
            return Err(IneligibleReason::NotPrinting);
        }
        if !position.is_in_bounds {
            return Err(IneligibleReason::OutOfBounds);
        }
        if position.snapshot_suppressed {
            return Err(IneligibleReason::Suppressed);
        }
        if self.args.excluded_features.contains(&position.feature) {
            return Err(IneligibleReason::FeatureExcluded);
        }
        if !self.args.allows(position.x, position.y) {
            return Err(IneligibleReason::RestrictedArea);
        }

        let eligible = if extruder.is_retracted() {
            EligibleReason::Retracted
        } else if self.args.ignore_retraction {
            EligibleReason::RetractionIgnored
        } else {
            return Err(IneligibleReason::NotRetracted);
        };

        if let Some(limit) = self.args.max_travel_feedrate {
            if position.is_travel && position.f > limit {
                return Err(IneligibleReason::UnsafeTravelSpeed);
            }
        }

        Ok(eligible)
    }
}
