//! Structured diagnostics emitted while processing a job.
//!
//! Every parse error, constraint violation, and strategy decision is recorded
//! as a [`Diagnostic`] so the host can surface it verbatim. Events are
//! cloneable and serializable for logging/replay. Recording also mirrors the
//! event through `tracing`; installing a subscriber is left to the host.

use serde::{Deserialize, Serialize};

use crate::error::{ConstraintViolation, InvariantFailure, ParseError};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational (strategy decisions)
    Info,
    /// Recoverable problem (skipped line, violated limit)
    Warning,
    /// The job aborted
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A decision taken by a stabilization strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategyDecision {
    /// A layer finished and one candidate was chosen.
    LayerSnapshot {
        /// Layer number that finished.
        layer: u32,
        /// Line index of the chosen trigger.
        chosen_line: usize,
        /// Number of eligible candidates seen in the layer.
        candidates: usize,
        /// Travel distance from the trigger to the parking position (mm).
        distance_mm: f64,
    },
    /// A layer finished with no eligible candidate.
    LayerSkipped {
        /// Layer number that finished.
        layer: u32,
    },
    /// A trigger satisfied the minimum interval.
    IntervalSnapshot {
        /// Line index of the chosen trigger.
        chosen_line: usize,
        /// Whether a snapshot directive forced the choice.
        forced: bool,
    },
}

impl StrategyDecision {
    /// Get a short description of this decision for logging
    pub fn description(&self) -> String {
        match self {
            StrategyDecision::LayerSnapshot {
                layer,
                chosen_line,
                candidates,
                distance_mm,
            } => format!(
                "Layer {} snapshot at line {} ({} candidate(s), {:.2} mm travel)",
                layer, chosen_line, candidates, distance_mm
            ),
            StrategyDecision::LayerSkipped { layer } => {
                format!("Layer {} skipped: no eligible trigger position", layer)
            }
            StrategyDecision::IntervalSnapshot {
                chosen_line,
                forced,
            } => {
                if *forced {
                    format!("Forced snapshot at line {}", chosen_line)
                } else {
                    format!("Interval snapshot at line {}", chosen_line)
                }
            }
        }
    }
}

/// Diagnostic payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A line failed to parse
    Parse(ParseError),
    /// A limit was violated
    Constraint(ConstraintViolation),
    /// A strategy picked or skipped a snapshot
    Decision(StrategyDecision),
    /// The job aborted on a broken invariant
    Invariant(InvariantFailure),
}

/// One structured event for the host to log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Line index the event refers to
    pub line_index: usize,
    /// How serious the event is
    pub severity: Severity,
    /// Event payload
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Get a short description of this diagnostic for logging
    pub fn description(&self) -> String {
        match &self.kind {
            DiagnosticKind::Parse(e) => e.to_string(),
            DiagnosticKind::Constraint(e) => e.to_string(),
            DiagnosticKind::Decision(d) => d.description(),
            DiagnosticKind::Invariant(e) => e.to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.description())
    }
}

/// Ordered, append-only diagnostics log for one job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parse error
    pub fn parse_error(&mut self, error: ParseError) {
        tracing::warn!("Skipping line {}: {}", error.line_index, error.kind);
        self.push(error.line_index, Severity::Warning, DiagnosticKind::Parse(error));
    }

    /// Record a constraint violation
    pub fn constraint(&mut self, violation: ConstraintViolation) {
        tracing::warn!("{}", violation);
        self.push(
            violation.line_index,
            Severity::Warning,
            DiagnosticKind::Constraint(violation),
        );
    }

    /// Record a strategy decision
    pub fn decision(&mut self, line_index: usize, decision: StrategyDecision) {
        tracing::debug!("{}", decision.description());
        self.push(line_index, Severity::Info, DiagnosticKind::Decision(decision));
    }

    /// Record an invariant failure
    pub fn invariant(&mut self, failure: InvariantFailure) {
        tracing::error!("{}", failure);
        self.push(
            failure.line_index,
            Severity::Error,
            DiagnosticKind::Invariant(failure),
        );
    }

    /// Record a parse error that aborted a strict job
    pub fn fatal_parse_error(&mut self, error: ParseError) {
        tracing::error!("Aborting job at line {}: {}", error.line_index, error.kind);
        self.push(error.line_index, Severity::Error, DiagnosticKind::Parse(error));
    }

    fn push(&mut self, line_index: usize, severity: Severity, kind: DiagnosticKind) {
        self.events.push(Diagnostic {
            line_index,
            severity,
            kind,
        });
    }

    /// All recorded events in order
    pub fn events(&self) -> &[Diagnostic] {
        &self.events
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events at or above the given severity
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter().filter(move |d| d.severity >= severity)
    }

    /// Take all events, leaving the log empty
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.events)
    }

    /// Consume the log
    pub fn into_events(self) -> Vec<Diagnostic> {
        self.events
    }
}
