//! # lapsekit core
//!
//! Core types, errors, and diagnostics shared by every lapsekit crate.
//! Provides the axis and coordinate primitives, machine bounds, the error
//! taxonomy of a snapshot job, and the structured diagnostics log.

pub mod data;
pub mod diagnostics;
pub mod error;

pub use data::{Axis, AxisBounds, AxisMode, Coordinates, MachineBounds, Units, COORDINATE_EPSILON};

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity, StrategyDecision};

pub use error::{
    ConfigurationError, ConstraintViolation, Error, InvariantFailure, ParseError, ParseErrorKind,
    Result, ViolationKind,
};
