//! Per-job G-code processing pipeline
//!
//! A [`GcodeProcessor`] owns one job's parser, tracker, evaluator, strategy,
//! and assembler. Lines flow strictly forward:
//!
//! ```text
//! raw line -> ParsedLine -> tracker update -> TriggerPosition -> Selection -> SnapshotPlan
//! ```
//!
//! Configuration is shared read-only through an `Arc`, so any number of
//! processors can run side by side without sharing mutable state.

use std::io::BufRead;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lapsekit_core::{ConfigurationError, Diagnostic, Diagnostics, Error, Result, Severity};
use lapsekit_parser::{CommentProcessor, GcodeParser};
use lapsekit_position::PositionTracker;

use crate::args::{GcodeProcessorArgs, ParsePolicy};
use crate::assembler::SnapshotPlanAssembler;
use crate::plan::SnapshotPlan;
use crate::strategy::{create_strategy, Selection, StabilizationStrategy};
use crate::trigger::TriggerEvaluator;

/// Unique job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Job({})", &self.0.to_string()[..8])
    }
}

/// Result of running a whole job
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    /// Job identifier
    pub job_id: JobId,
    /// Plans in line order
    pub plans: Vec<SnapshotPlan>,
    /// Every diagnostic event of the job
    pub diagnostics: Vec<Diagnostic>,
    /// Number of lines fed to the job
    pub line_count: usize,
    /// Line at which the job aborted, if it did
    pub aborted_at: Option<usize>,
}

impl ProcessingReport {
    /// Check if the job ran to the end
    pub fn is_complete(&self) -> bool {
        self.aborted_at.is_none()
    }

    /// Per-line view: every line index with the plan spliced after it
    pub fn annotated(&self) -> Vec<(usize, Option<&SnapshotPlan>)> {
        let mut plans = self.plans.iter().peekable();
        (0..self.line_count)
            .map(|index| {
                let plan = plans.next_if(|plan| plan.line_index() == index);
                (index, plan)
            })
            .collect()
    }

    /// Diagnostics at or above `severity`
    pub fn diagnostics_at_least(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity >= severity)
    }
}

/// Runs one print job through the stabilization pipeline
#[derive(Debug)]
pub struct GcodeProcessor {
    id: JobId,
    args: Arc<GcodeProcessorArgs>,
    parser: GcodeParser,
    tracker: PositionTracker,
    evaluator: TriggerEvaluator,
    strategy: Box<dyn StabilizationStrategy>,
    assembler: SnapshotPlanAssembler,
    diagnostics: Diagnostics,
    next_line: usize,
    aborted_at: Option<usize>,
}

impl GcodeProcessor {
    /// Create a processor for a new job
    ///
    /// The configuration is validated before anything else happens.
    pub fn new(args: Arc<GcodeProcessorArgs>) -> std::result::Result<Self, ConfigurationError> {
        args.validate()?;

        let comments = CommentProcessor::new(&args.comments)?;
        let parser = GcodeParser::new(Arc::new(args.grammar()), comments);
        let tracker = PositionTracker::new(args.position.clone())?;
        let evaluator = TriggerEvaluator::new(args.trigger.clone());
        let strategy = create_strategy(&args.stabilization, args.position.bounds);
        let assembler = SnapshotPlanAssembler::new(
            args.stabilization.clone(),
            args.snapshot.clone(),
            args.position.bounds,
            args.position.g90_influences_extruder,
        );

        let id = JobId::new();
        tracing::info!("{} started with {} strategy", id, strategy.name());

        Ok(Self {
            id,
            args,
            parser,
            tracker,
            evaluator,
            strategy,
            assembler,
            diagnostics: Diagnostics::new(),
            next_line: 0,
            aborted_at: None,
        })
    }

    /// Job identifier
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Configuration in use
    pub fn args(&self) -> &GcodeProcessorArgs {
        &self.args
    }

    /// Tracker state after the last line
    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    /// Diagnostics recorded so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Take the diagnostics recorded so far
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain()
    }

    /// Index the next line will get
    pub fn next_line_index(&self) -> usize {
        self.next_line
    }

    /// Line at which the job aborted, if it did
    pub fn aborted_at(&self) -> Option<usize> {
        self.aborted_at
    }

    /// Process the next line of the job
    ///
    /// Returns the plans finalized by this line. Plans may belong to earlier
    /// lines: the layer strategy only decides once the layer is over.
    pub fn process_line(&mut self, line: &str) -> Result<Vec<SnapshotPlan>> {
        if let Some(line_index) = self.aborted_at {
            return Err(Error::JobAborted { line_index });
        }
        let line_index = self.next_line;
        self.next_line += 1;

        let parsed = match self.parser.parse_line(line, line_index) {
            Ok(parsed) => parsed,
            Err(error) => match self.args.parse_policy {
                ParsePolicy::Permissive => {
                    self.diagnostics.parse_error(error);
                    return Ok(Vec::new());
                }
                ParsePolicy::Strict => {
                    self.diagnostics.fatal_parse_error(error.clone());
                    self.aborted_at = Some(line_index);
                    return Err(error.into());
                }
            },
        };

        let update = match self.tracker.update(&parsed) {
            Ok(update) => update,
            Err(failure) => {
                self.diagnostics.invariant(failure.clone());
                self.aborted_at = Some(line_index);
                return Err(failure.into());
            }
        };
        for violation in update.violations {
            self.diagnostics.constraint(violation);
        }

        // Blank and plain comment lines change nothing a strategy could use.
        if parsed.is_noop() && parsed.annotations.is_empty() {
            return Ok(Vec::new());
        }

        let trigger = self.evaluator.evaluate(line_index, &self.tracker);
        let selections = self.strategy.consume(trigger);
        Ok(self.assemble(selections))
    }

    /// Flush decisions still pending at the end of the job
    pub fn finish(&mut self) -> Result<Vec<SnapshotPlan>> {
        if let Some(line_index) = self.aborted_at {
            return Err(Error::JobAborted { line_index });
        }
        let selections = self.strategy.finish();
        let plans = self.assemble(selections);
        tracing::info!(
            "{} finished after {} line(s), {} diagnostic(s)",
            self.id,
            self.next_line,
            self.diagnostics.len()
        );
        Ok(plans)
    }

    /// Run a whole job and collect the report
    ///
    /// Stops at the first fatal error; plans finalized before that point are
    /// kept in the report.
    pub fn process_lines<I, S>(mut self, lines: I) -> ProcessingReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plans = Vec::new();
        for line in lines {
            match self.process_line(line.as_ref()) {
                Ok(mut finalized) => plans.append(&mut finalized),
                Err(_) => break,
            }
        }
        if let Ok(mut finalized) = self.finish() {
            plans.append(&mut finalized);
        }
        self.into_report(plans)
    }

    /// Run a whole job read from `reader`
    ///
    /// I/O errors are returned as [`Error::Io`]; G-code problems end up in
    /// the report as with [`process_lines`](Self::process_lines). Bytes that
    /// are not valid UTF-8 are replaced with U+FFFD.
    pub fn process_reader<R: BufRead>(mut self, mut reader: R) -> Result<ProcessingReport> {
        let mut plans = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let bytes = buf.strip_suffix(b"\n").unwrap_or(&buf);
            let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
            match self.process_line(&String::from_utf8_lossy(bytes)) {
                Ok(mut finalized) => plans.append(&mut finalized),
                Err(_) => break,
            }
        }
        if let Ok(mut finalized) = self.finish() {
            plans.append(&mut finalized);
        }
        Ok(self.into_report(plans))
    }

    /// Reset all job state so the processor can run another job
    pub fn reset(&mut self) {
        self.id = JobId::new();
        self.tracker.reset();
        self.strategy.reset();
        self.diagnostics = Diagnostics::new();
        self.next_line = 0;
        self.aborted_at = None;
    }

    fn assemble(&mut self, selections: Vec<Selection>) -> Vec<SnapshotPlan> {
        let mut plans = Vec::new();
        for selection in selections {
            self.diagnostics
                .decision(selection.line_index, selection.decision);
            let Some(trigger) = selection.trigger else {
                continue;
            };
            match self.assembler.assemble(trigger) {
                Ok(plan) => plans.push(plan),
                Err(violation) => self.diagnostics.constraint(violation),
            }
        }
        plans
    }

    fn into_report(self, mut plans: Vec<SnapshotPlan>) -> ProcessingReport {
        plans.sort_by_key(SnapshotPlan::line_index);
        ProcessingReport {
            job_id: self.id,
            plans,
            diagnostics: self.diagnostics.into_events(),
            line_count: self.next_line,
            aborted_at: self.aborted_at,
        }
    }
}
