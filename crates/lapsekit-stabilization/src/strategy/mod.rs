//! Stabilization strategies
//!
//! A strategy consumes the stream of evaluated trigger positions and decides
//! which of them become snapshots. Strategies never touch the motion
//! commands; the processor turns each chosen trigger into a plan.

mod smart_gcode;
mod smart_layer;

pub use smart_gcode::SmartGcodeStrategy;
pub use smart_layer::SmartLayerStrategy;

use lapsekit_core::{MachineBounds, StrategyDecision};

use crate::args::{StabilizationArgs, StrategyKind};
use crate::trigger::TriggerPosition;

/// Outcome of one strategy decision
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Line at which the decision was taken
    pub line_index: usize,
    /// The decision, for diagnostics
    pub decision: StrategyDecision,
    /// Chosen trigger; `None` when the decision skipped a snapshot
    pub trigger: Option<TriggerPosition>,
}

impl Selection {
    /// A decision that takes a snapshot at `trigger`
    pub fn chosen(line_index: usize, trigger: TriggerPosition, decision: StrategyDecision) -> Self {
        Self {
            line_index,
            decision,
            trigger: Some(trigger),
        }
    }

    /// A decision that takes no snapshot
    pub fn skipped(line_index: usize, decision: StrategyDecision) -> Self {
        Self {
            line_index,
            decision,
            trigger: None,
        }
    }
}

/// Chooses snapshot triggers from a stream of candidates
///
/// Implementations are deterministic and keep state for one job only.
pub trait StabilizationStrategy: Send + std::fmt::Debug {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Consume the next candidate, returning decisions it finalized
    fn consume(&mut self, trigger: TriggerPosition) -> Vec<Selection>;

    /// Flush pending decisions at the end of the job
    fn finish(&mut self) -> Vec<Selection>;

    /// Forget all job state
    fn reset(&mut self);
}

/// Create the configured strategy
pub fn create_strategy(
    args: &StabilizationArgs,
    bounds: MachineBounds,
) -> Box<dyn StabilizationStrategy> {
    match args.strategy {
        StrategyKind::Layer => Box::new(SmartLayerStrategy::new(args.clone(), bounds)),
        StrategyKind::Gcode => Box::new(SmartGcodeStrategy::new(args.minimum_interval)),
    }
}
