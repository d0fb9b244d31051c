//! Fine-grained snapshots spaced by a minimum interval

use lapsekit_core::StrategyDecision;

use super::{Selection, StabilizationStrategy};
use crate::args::MinimumInterval;
use crate::trigger::TriggerPosition;

/// Takes a snapshot at the first eligible candidate after the interval
///
/// The interval is measured from the previous snapshot's trigger using the
/// tracker's print-time or distance estimate. A snapshot directive lets the
/// next eligible candidate through regardless of the interval.
#[derive(Debug, Clone)]
pub struct SmartGcodeStrategy {
    interval: MinimumInterval,
    last: Option<TriggerPosition>,
    forced: bool,
}

impl SmartGcodeStrategy {
    /// Create a fine-grained strategy
    pub fn new(interval: MinimumInterval) -> Self {
        Self {
            interval,
            last: None,
            forced: false,
        }
    }

    fn interval_elapsed(&self, trigger: &TriggerPosition) -> bool {
        let Some(last) = &self.last else {
            return true;
        };
        let (now, then) = (&trigger.position, &last.position);
        match self.interval {
            MinimumInterval::Seconds(seconds) => now.print_time_s - then.print_time_s >= seconds,
            MinimumInterval::Millimeters(mm) => now.distance_mm - then.distance_mm >= mm,
        }
    }
}

impl StabilizationStrategy for SmartGcodeStrategy {
    fn name(&self) -> &'static str {
        "gcode"
    }

    fn consume(&mut self, trigger: TriggerPosition) -> Vec<Selection> {
        if trigger.position.snapshot_requested {
            self.forced = true;
        }
        if !trigger.is_eligible() {
            return Vec::new();
        }

        let elapsed = self.interval_elapsed(&trigger);
        if !elapsed && !self.forced {
            return Vec::new();
        }

        let forced = self.forced && !elapsed;
        self.forced = false;
        self.last = Some(trigger);
        vec![Selection::chosen(
            trigger.line_index,
            trigger,
            StrategyDecision::IntervalSnapshot {
                chosen_line: trigger.line_index,
                forced,
            },
        )]
    }

    fn finish(&mut self) -> Vec<Selection> {
        Vec::new()
    }

    fn reset(&mut self) {
        self.last = None;
        self.forced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::candidate;

    fn at_distance(line: usize, distance_mm: f64, eligible: bool) -> TriggerPosition {
        let mut trigger = candidate(line, 1, distance_mm, 0.0, eligible);
        trigger.position.distance_mm = distance_mm;
        trigger.position.print_time_s = distance_mm / 10.0;
        trigger
    }

    fn chosen(strategy: &mut SmartGcodeStrategy, triggers: Vec<TriggerPosition>) -> Vec<usize> {
        triggers
            .into_iter()
            .flat_map(|t| strategy.consume(t))
            .filter_map(|s| s.trigger.map(|t| t.line_index))
            .collect()
    }

    #[test]
    fn test_distance_interval() {
        let mut s = SmartGcodeStrategy::new(MinimumInterval::Millimeters(50.0));
        let lines = chosen(
            &mut s,
            vec![
                at_distance(1, 0.0, true),
                at_distance(2, 30.0, true),
                at_distance(3, 55.0, false),
                at_distance(4, 60.0, true),
                at_distance(5, 100.0, true),
                at_distance(6, 110.0, true),
            ],
        );
        assert_eq!(lines, vec![1, 4, 6]);
    }

    #[test]
    fn test_time_interval() {
        let mut s = SmartGcodeStrategy::new(MinimumInterval::Seconds(5.0));
        let lines = chosen(
            &mut s,
            vec![
                at_distance(1, 0.0, true),
                at_distance(2, 40.0, true),
                at_distance(3, 50.0, true),
            ],
        );
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_directive_forces_next_eligible() {
        let mut s = SmartGcodeStrategy::new(MinimumInterval::Millimeters(1000.0));
        s.consume(at_distance(1, 0.0, true));

        let mut request = at_distance(2, 1.0, false);
        request.position.snapshot_requested = true;
        assert!(s.consume(request).is_empty());

        let selections = s.consume(at_distance(3, 2.0, true));
        assert_eq!(selections.len(), 1);
        assert_eq!(
            selections[0].decision,
            StrategyDecision::IntervalSnapshot {
                chosen_line: 3,
                forced: true
            }
        );
        assert!(s.consume(at_distance(4, 3.0, true)).is_empty());
    }

    #[test]
    fn test_reset() {
        let mut s = SmartGcodeStrategy::new(MinimumInterval::Millimeters(1000.0));
        s.consume(at_distance(1, 0.0, true));
        s.reset();
        assert_eq!(s.consume(at_distance(2, 1.0, true)).len(), 1);
    }
}
