//! # lapsekit-stabilization
//!
//! Decides where a stabilized timelapse snapshot can be taken and how.
//!
//! This crate provides:
//! - Trigger evaluation: is the current instant a safe snapshot position?
//! - Stabilization strategies: one snapshot per layer, or interval-spaced
//! - Snapshot plan assembly and G-code rendering
//! - The per-job [`GcodeProcessor`] tying parser, tracker, and strategy together
//!
//! ```no_run
//! use std::sync::Arc;
//! use lapsekit_stabilization::{GcodeProcessor, GcodeProcessorArgs};
//!
//! let processor = GcodeProcessor::new(Arc::new(GcodeProcessorArgs::default()))?;
//! let report = processor.process_lines(["G28", "G1 Z0.2", "G1 X10 E1", "G1 E0"]);
//! for (line, plan) in report.annotated() {
//!     if let Some(plan) = plan {
//!         println!("snapshot after line {}: {} step(s)", line, plan.steps.len());
//!     }
//! }
//! # Ok::<(), lapsekit_core::ConfigurationError>(())
//! ```

pub mod args;
pub mod assembler;
pub mod plan;
pub mod processor;
pub mod render;
pub mod strategy;
pub mod trigger;

pub use args::{
    GcodeProcessorArgs, LayerSelection, MinimumInterval, ParsePolicy, PositionRestriction,
    RestrictionKind, RestrictionShape, SnapshotPlanArgs, StabilizationArgs, StabilizationAxis,
    StrategyKind, TieBreak, TriggerArgs,
};
pub use assembler::SnapshotPlanAssembler;
pub use plan::{PlanState, SnapshotPlan, SnapshotPlanStep};
pub use processor::{GcodeProcessor, JobId, ProcessingReport};
pub use render::render_gcode;
pub use strategy::{
    create_strategy, Selection, SmartGcodeStrategy, SmartLayerStrategy, StabilizationStrategy,
};
pub use trigger::{
    EligibleReason, IneligibleReason, TriggerEvaluator, TriggerPosition, TriggerVerdict,
};
