//! One snapshot per layer at the best candidate

use std::cmp::Ordering;

use lapsekit_core::{MachineBounds, StrategyDecision};

use super::{Selection, StabilizationStrategy};
use crate::args::{LayerSelection, StabilizationArgs, TieBreak};
use crate::trigger::TriggerPosition;

/// An eligible candidate with its travel distance to the parking position
#[derive(Debug, Clone, Copy)]
struct Candidate {
    trigger: TriggerPosition,
    distance_mm: f64,
}

/// Buffers eligible candidates per layer and picks one when the layer ends
///
/// A layer ends when a candidate from a later layer arrives or the job
/// finishes. Layers without an eligible candidate produce no snapshot.
#[derive(Debug, Clone)]
pub struct SmartLayerStrategy {
    args: StabilizationArgs,
    bounds: MachineBounds,
    layer: u32,
    candidates: Vec<Candidate>,
    last_line: usize,
}

impl SmartLayerStrategy {
    /// Create a layer strategy
    pub fn new(args: StabilizationArgs, bounds: MachineBounds) -> Self {
        Self {
            args,
            bounds,
            layer: 0,
            candidates: Vec::new(),
            last_line: 0,
        }
    }

    /// Ranking of two candidates; `Less` means `a` is better
    fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let retracted = b
            .trigger
            .verdict
            .is_retracted()
            .cmp(&a.trigger.verdict.is_retracted());
        if retracted != Ordering::Equal {
            return retracted;
        }

        if self.args.layer_selection == LayerSelection::MinimalTravel
            && (a.distance_mm - b.distance_mm).abs() > self.args.distance_tolerance_mm
        {
            return a.distance_mm.total_cmp(&b.distance_mm);
        }

        let order = a.trigger.line_index.cmp(&b.trigger.line_index);
        match self.args.tie_break {
            TieBreak::Earliest => order,
            TieBreak::Latest => order.reverse(),
        }
    }

    /// Close the current layer, deciding at `line_index`
    fn finish_layer(&mut self, line_index: usize) -> Option<Selection> {
        if self.layer == 0 {
            return None;
        }
        let layer = self.layer;
        let candidates = std::mem::take(&mut self.candidates);

        let best = candidates
            .iter()
            .copied()
            .reduce(|best, next| match self.compare(&next, &best) {
                Ordering::Less => next,
                _ => best,
            });

        Some(match best {
            Some(best) => Selection::chosen(
                line_index,
                best.trigger,
                StrategyDecision::LayerSnapshot {
                    layer,
                    chosen_line: best.trigger.line_index,
                    candidates: candidates.len(),
                    distance_mm: best.distance_mm,
                },
            ),
            None => Selection::skipped(line_index, StrategyDecision::LayerSkipped { layer }),
        })
    }
}

impl StabilizationStrategy for SmartLayerStrategy {
    fn name(&self) -> &'static str {
        "layer"
    }

    fn consume(&mut self, trigger: TriggerPosition) -> Vec<Selection> {
        let mut selections = Vec::new();
        self.last_line = trigger.line_index;

        let layer = trigger.position.layer;
        if layer != self.layer {
            selections.extend(self.finish_layer(trigger.line_index));
            self.layer = layer;
        }

        if trigger.is_eligible() {
            let from = trigger.position.coordinates();
            let target = self.args.parking_target(&self.bounds, from);
            self.candidates.push(Candidate {
                trigger,
                distance_mm: from.distance_to(&target),
            });
        }
        selections
    }

    fn finish(&mut self) -> Vec<Selection> {
        let selections = self.finish_layer(self.last_line).into_iter().collect();
        self.layer = 0;
        selections
    }

    fn reset(&mut self) {
        self.layer = 0;
        self.candidates.clear();
        self.last_line = 0;
    }
}
