//! # lapsekit
//!
//! Stabilized timelapse planning for 3D printer G-code:
//! - Streaming, dialect-tolerant G-code parsing
//! - Incremental position, extrusion, and retraction tracking
//! - Layer and fine-grained stabilization strategies
//! - Snapshot plans that park the head, fire the camera, and restore state
//!
//! ## Architecture
//!
//! lapsekit is organized as a workspace with multiple crates:
//!
//! 1. **lapsekit-core** - Errors, coordinates, bounds, diagnostics
//! 2. **lapsekit-parser** - Command grammar, parser, comment processor
//! 3. **lapsekit-position** - Position and extruder tracking
//! 4. **lapsekit-stabilization** - Trigger evaluation, strategies, plans, job processor
//! 5. **lapsekit-settings** - Job configuration files
//! 6. **lapsekit** - Logging bootstrap and the command-line tool

pub mod cli;

pub use lapsekit_core::{
    Axis, AxisBounds, AxisMode, ConfigurationError, ConstraintViolation, Coordinates, Diagnostic,
    DiagnosticKind, Diagnostics, Error, InvariantFailure, MachineBounds, ParseError, Result,
    Severity, StrategyDecision, Units,
};
pub use lapsekit_parser::{CommentProcessor, GcodeParser, ParsedLine};
pub use lapsekit_position::{ExtruderState, Position, PositionArgs, PositionTracker};
pub use lapsekit_settings::{JobSettings, SettingsError};
pub use lapsekit_stabilization::{
    render_gcode, GcodeProcessor, GcodeProcessorArgs, ProcessingReport, SnapshotPlan,
    SnapshotPlanStep, StrategyKind,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Filter directive for a `-v` count, falling back to `configured`
pub fn verbosity_filter(verbosity: u8, configured: &str) -> &str {
    match verbosity {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr so stdout stays clean for results
/// - RUST_LOG environment variable support, overriding `filter`
/// - Optional JSON lines
pub fn init_logging(filter: &str, json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry.with(fmt_layer.json()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
