//! Parsed G-code command types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::comments::Annotation;

/// Value carried by a parameter word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// Numeric value (always parsed as `f64`)
    Number(f64),
    /// Quoted string value (e.g. `P"config.g"`)
    Text(String),
    /// Letter with no value (e.g. the `X` of `G28 X`)
    Flag,
}

impl ParameterValue {
    /// Numeric value, if any
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// One parameter word of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Upper-case parameter letter
    pub letter: char,
    /// Parameter value
    pub value: ParameterValue,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            ParameterValue::Number(value) => write!(f, "{}{}", self.letter, value),
            ParameterValue::Text(text) => write!(f, "{}\"{}\"", self.letter, text),
            ParameterValue::Flag => write!(f, "{}", self.letter),
        }
    }
}

/// A single executable G-code command
///
/// Immutable once produced by the parser. Opcodes are normalised to upper
/// case without leading zeros (`g01` becomes `G1`), tool selections keep their
/// index (`T1`), and extended commands keep their full name
/// (`SET_FAN_SPEED`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// Normalised opcode or extended command name
    pub command: String,
    /// Parameter words in order of appearance (last duplicate wins)
    pub parameters: Vec<Parameter>,
    /// `KEY=VALUE` arguments of extended commands
    pub arguments: Vec<(String, String)>,
    /// Free text argument of text commands such as `M117`
    pub text: Option<String>,
    /// Original line text
    pub line: String,
    /// Zero-based index of the line in the job
    pub line_index: usize,
    /// `N` line number, if present
    pub gcode_line_number: Option<u64>,
    /// `*` checksum, if present
    pub checksum: Option<u8>,
}

impl ParsedCommand {
    /// Create a command with no parameters
    pub fn new(command: impl Into<String>, line: impl Into<String>, line_index: usize) -> Self {
        Self {
            command: command.into(),
            parameters: Vec::new(),
            arguments: Vec::new(),
            text: None,
            line: line.into(),
            line_index,
            gcode_line_number: None,
            checksum: None,
        }
    }

    /// Get a parameter value by letter
    pub fn get(&self, letter: char) -> Option<&ParameterValue> {
        self.parameters
            .iter()
            .find(|p| p.letter == letter)
            .map(|p| &p.value)
    }

    /// Get a numeric parameter by letter
    pub fn number(&self, letter: char) -> Option<f64> {
        self.get(letter).and_then(ParameterValue::as_number)
    }

    /// Check if a parameter letter is present (with or without value)
    pub fn has(&self, letter: char) -> bool {
        self.parameters.iter().any(|p| p.letter == letter)
    }

    /// Get an extended-command argument by key (case-insensitive)
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Extruder index of a `T<n>` tool selection
    pub fn tool_index(&self) -> Option<usize> {
        self.command.strip_prefix('T')?.parse().ok()
    }

    /// Insert a parameter, replacing an earlier word with the same letter
    pub(crate) fn set_parameter(&mut self, letter: char, value: ParameterValue) {
        self.parameters.retain(|p| p.letter != letter);
        self.parameters.push(Parameter { letter, value });
    }
}

impl fmt::Display for ParsedCommand {
    /// Reassembles canonical G-code for the command
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for parameter in &self.parameters {
            write!(f, " {}", parameter)?;
        }
        for (key, value) in &self.arguments {
            if value.is_empty() {
                write!(f, " {}", key)?;
            } else {
                write!(f, " {}={}", key, value)?;
            }
        }
        if let Some(text) = &self.text {
            write!(f, " {}", text)?;
        }
        Ok(())
    }
}

/// What a line turned out to be
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LineKind {
    /// An executable command
    Command(ParsedCommand),
    /// Blank, comment-only, or host-command line
    NoOp,
}

/// A parsed line with its comment annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLine {
    /// Zero-based index of the line in the job
    pub line_index: usize,
    /// Command or no-op
    pub kind: LineKind,
    /// Recognized directives and slicer feature markers
    pub annotations: Vec<Annotation>,
}

impl ParsedLine {
    /// The command, if the line is executable
    pub fn command(&self) -> Option<&ParsedCommand> {
        match &self.kind {
            LineKind::Command(command) => Some(command),
            LineKind::NoOp => None,
        }
    }

    /// Check if the line carries no executable command
    pub fn is_noop(&self) -> bool {
        matches!(self.kind, LineKind::NoOp)
    }
}
