//! Error handling for lapsekit
//!
//! Provides the error taxonomy shared by every layer of a snapshot job:
//! - Parse errors (malformed G-code lines, recoverable)
//! - Constraint violations (axis or tool limits, recorded and non-fatal)
//! - Configuration errors (invalid job bundle, fatal before any line)
//! - Invariant failures (corrupted tracker state, fatal)
//!
//! All error types use `thiserror` for ergonomic error handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Axis;

/// The reason a line failed to parse
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParseErrorKind {
    /// A token that is not a word, a known parameter, or a comment
    #[error("Unrecognized token '{token}'")]
    UnrecognizedToken {
        /// The offending token text.
        token: String,
    },

    /// A numeric literal that does not fit in an `f64`
    #[error("Numeric overflow in parameter {letter}: {literal}")]
    NumericOverflow {
        /// The parameter letter carrying the literal.
        letter: char,
        /// The literal as written.
        literal: String,
    },

    /// Parameters were found but no command word precedes them
    #[error("Missing command word")]
    MissingOpcode,
}

/// A malformed G-code line
///
/// Recoverable: in permissive mode the line is reported and skipped.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Parse error at line {line_index}: {kind} in '{text}'")]
pub struct ParseError {
    /// What went wrong.
    pub kind: ParseErrorKind,
    /// Zero-based index of the line in the job.
    pub line_index: usize,
    /// Original line text.
    pub text: String,
}

impl ParseError {
    /// Create a parse error for the given line
    pub fn new(kind: ParseErrorKind, line_index: usize, text: impl Into<String>) -> Self {
        Self {
            kind,
            line_index,
            text: text.into(),
        }
    }
}

/// Which limit a command or plan ran into
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A tracked axis left the configured machine bounds
    #[error("Axis {axis} at {value:.3} outside [{min:.3}, {max:.3}]")]
    AxisOutOfBounds {
        /// The axis that left its bounds.
        axis: Axis,
        /// The resulting coordinate.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// A tool change referenced an extruder that does not exist
    #[error("Tool T{requested} requested but only {available} extruder(s) configured")]
    UnknownTool {
        /// The requested extruder index.
        requested: usize,
        /// Number of configured extruders.
        available: usize,
    },

    /// A snapshot plan travel step would leave the machine bounds
    #[error("Snapshot travel on {axis} to {value:.3} outside [{min:.3}, {max:.3}]")]
    PlanOutOfBounds {
        /// The axis that would leave its bounds.
        axis: Axis,
        /// The requested coordinate.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

/// A recorded, non-fatal limit violation
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Constraint violation at line {line_index}: {kind}")]
pub struct ConstraintViolation {
    /// Zero-based index of the line that caused the violation.
    pub line_index: usize,
    /// The violated limit.
    pub kind: ViolationKind,
}

impl ConstraintViolation {
    /// Create a constraint violation for the given line
    pub fn new(line_index: usize, kind: ViolationKind) -> Self {
        Self { line_index, kind }
    }
}

/// An invalid configuration bundle
///
/// Fatal: the job is rejected before any line is processed.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Invalid configuration '{field}': {reason}")]
pub struct ConfigurationError {
    /// Dotted path of the offending field (e.g. `position.bounds.x`).
    pub field: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl ConfigurationError {
    /// Create a configuration error for a field
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Tracker or strategy state that can no longer be trusted
///
/// Fatal: the job aborts at the point of detection.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Internal invariant failure at line {line_index}: {reason}")]
pub struct InvariantFailure {
    /// Zero-based index of the line being processed.
    pub line_index: usize,
    /// The invariant that was broken.
    pub reason: String,
}

impl InvariantFailure {
    /// Create an invariant failure for the given line
    pub fn new(line_index: usize, reason: impl Into<String>) -> Self {
        Self {
            line_index,
            reason: reason.into(),
        }
    }
}

/// Main error type for lapsekit
///
/// Returned by the job API. Constraint violations never surface here; they
/// are only recorded as diagnostics.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed line
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Invalid configuration bundle
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Broken internal invariant
    #[error(transparent)]
    Invariant(#[from] InvariantFailure),

    /// The job already aborted; no more lines are accepted
    #[error("Job aborted at line {line_index}")]
    JobAborted {
        /// Line index at which the job aborted.
        line_index: usize,
    },

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error ends the job
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::Invariant(_) | Error::JobAborted { .. }
        )
    }

    /// Check if this is a parse error
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Parse(_))
    }

    /// Check if this is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Check if this is an invariant failure
    pub fn is_invariant_failure(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
