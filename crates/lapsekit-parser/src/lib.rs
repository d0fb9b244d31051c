//! # lapsekit parser
//!
//! G-code command parsing for lapsekit.
//!
//! This crate provides:
//! - A table-driven dialect grammar (opcode → accepted parameter letters)
//! - A stateless, whitespace- and case-tolerant line parser
//! - Comment splitting with directive and slicer feature classification

pub mod command;
pub mod comments;
pub mod grammar;
pub mod parser;

pub use command::{LineKind, Parameter, ParameterValue, ParsedCommand, ParsedLine};
pub use comments::{
    Annotation, CommentArgs, CommentProcessor, Directive, FeatureType, SplitLine,
    DEFAULT_MARKER_PREFIX,
};
pub use grammar::{CommandGrammar, CommandRule};
pub use parser::GcodeParser;
