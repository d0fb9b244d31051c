//! Comment splitting and annotation classification
//!
//! Comments in G-code can be:
//! - Semicolon: `G1 X10 ; move to X10`
//! - Parentheses: `G1 (inline) X10`
//! - Host commands: `@LAPSE TAKE-SNAPSHOT` on a line by itself
//!
//! Comment text is checked for reserved directives (marker prefix followed by
//! a directive word) and for slicer section markers. Everything else is
//! discarded.

use regex::Regex;
use serde::{Deserialize, Serialize};

use lapsekit_core::ConfigurationError;

/// Default reserved marker prefix
pub const DEFAULT_MARKER_PREFIX: &str = "@LAPSE";

/// Directive addressed to the stabilization system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Start a new layer now
    LayerChange,
    /// Begin a region where no snapshot may be taken
    SuppressStart,
    /// End a suppressed region
    SuppressEnd,
    /// Take a snapshot at the next eligible position
    TakeSnapshot,
}

impl Directive {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().replace('_', "-").as_str() {
            "LAYER-CHANGE" => Some(Directive::LayerChange),
            "SUPPRESS-START" => Some(Directive::SuppressStart),
            "SUPPRESS-END" => Some(Directive::SuppressEnd),
            "TAKE-SNAPSHOT" => Some(Directive::TakeSnapshot),
            _ => None,
        }
    }
}

/// Print feature announced by a slicer section comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    /// No section marker seen, or an unclassified one
    #[default]
    Unknown,
    /// Visible outer wall
    OuterPerimeter,
    /// Inner wall
    InnerPerimeter,
    /// Sparse infill
    Infill,
    /// Solid infill
    SolidInfill,
    /// Top solid surface
    TopSolidInfill,
    /// Bridge over air
    Bridge,
    /// Gap fill
    GapFill,
    /// Skirt or brim
    Skirt,
    /// Support material
    Support,
    /// Prime tower, wipe tower, or ooze shield
    PrimeTower,
}

impl FeatureType {
    /// Classify the value of a `TYPE:` section marker (Cura and PrusaSlicer)
    fn from_type_marker(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "wall-outer" | "external perimeter" | "overhang perimeter" => Self::OuterPerimeter,
            "wall-inner" | "perimeter" => Self::InnerPerimeter,
            "fill" | "internal infill" => Self::Infill,
            "skin" | "solid infill" => Self::SolidInfill,
            "top solid infill" => Self::TopSolidInfill,
            "bridge infill" => Self::Bridge,
            "gap fill" => Self::GapFill,
            "skirt" | "skirt/brim" => Self::Skirt,
            "support" | "support-interface" | "support material"
            | "support material interface" => Self::Support,
            "prime-tower" | "wipe tower" => Self::PrimeTower,
            _ => Self::Unknown,
        }
    }

    /// Classify a bare Simplify3D section comment
    fn from_simplify3d(comment: &str) -> Option<Self> {
        match comment.trim().to_ascii_lowercase().as_str() {
            "outer perimeter" => Some(Self::OuterPerimeter),
            "inner perimeter" => Some(Self::InnerPerimeter),
            "infill" => Some(Self::Infill),
            "solid layer" => Some(Self::SolidInfill),
            "bridge" => Some(Self::Bridge),
            "gap fill" => Some(Self::GapFill),
            "skirt" => Some(Self::Skirt),
            "support" | "dense support" => Some(Self::Support),
            "prime pillar" | "ooze shield" => Some(Self::PrimeTower),
            _ => None,
        }
    }
}

/// A recognized comment annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// Reserved-prefix directive
    Directive(Directive),
    /// Slicer section marker
    Feature(FeatureType),
}

/// Comment processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentArgs {
    /// Reserved marker prefix introducing directives
    pub marker_prefix: String,
    /// Classify slicer section comments into feature types
    pub detect_features: bool,
}

impl Default for CommentArgs {
    fn default() -> Self {
        Self {
            marker_prefix: DEFAULT_MARKER_PREFIX.to_string(),
            detect_features: true,
        }
    }
}

impl CommentArgs {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let prefix = self.marker_prefix.trim();
        if prefix.is_empty() {
            return Err(ConfigurationError::new(
                "comments.marker_prefix",
                "must not be empty",
            ));
        }
        if prefix.chars().any(char::is_whitespace) {
            return Err(ConfigurationError::new(
                "comments.marker_prefix",
                "must not contain whitespace",
            ));
        }
        Ok(())
    }
}

/// A line with its comments removed
#[derive(Debug, Clone, PartialEq)]
pub struct SplitLine {
    /// Executable portion, trimmed
    pub code: String,
    /// Recognized annotations in order of appearance
    pub annotations: Vec<Annotation>,
}

/// Splits comments from code and classifies them
#[derive(Debug, Clone)]
pub struct CommentProcessor {
    directive: Regex,
    detect_features: bool,
}

impl CommentProcessor {
    /// Create a comment processor from validated arguments
    pub fn new(args: &CommentArgs) -> Result<Self, ConfigurationError> {
        args.validate()?;
        let pattern = format!(
            r"(?i)^\s*{}\s+([A-Z_-]+)",
            regex::escape(args.marker_prefix.trim())
        );
        let directive = Regex::new(&pattern)
            .map_err(|e| ConfigurationError::new("comments.marker_prefix", e.to_string()))?;
        Ok(Self {
            directive,
            detect_features: args.detect_features,
        })
    }

    /// Split a raw line into code and annotations
    pub fn split(&self, line: &str) -> SplitLine {
        let trimmed = line.trim();

        // Host command lines are never executable.
        if trimmed.starts_with('@') {
            return SplitLine {
                code: String::new(),
                annotations: self.classify(trimmed).into_iter().collect(),
            };
        }

        let mut code = String::with_capacity(line.len());
        let mut annotations = Vec::new();
        let mut rest = line;

        while let Some(start) = rest.find(['(', ';']) {
            code.push_str(&rest[..start]);
            let marker = rest.as_bytes()[start];
            let after = &rest[start + 1..];

            if marker == b';' {
                annotations.extend(self.classify(after));
                rest = "";
                break;
            }

            match after.find(')') {
                Some(end) => {
                    annotations.extend(self.classify(&after[..end]));
                    // Keep tokens on both sides of the comment apart.
                    code.push(' ');
                    rest = &after[end + 1..];
                }
                None => {
                    annotations.extend(self.classify(after));
                    rest = "";
                    break;
                }
            }
        }
        code.push_str(rest);

        SplitLine {
            code: code.trim().to_string(),
            annotations,
        }
    }

    /// Classify one comment's text
    pub fn classify(&self, comment: &str) -> Option<Annotation> {
        if let Some(captures) = self.directive.captures(comment) {
            return captures
                .get(1)
                .and_then(|word| Directive::from_word(word.as_str()))
                .map(Annotation::Directive);
        }

        if !self.detect_features {
            return None;
        }

        static TYPE_MARKER: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let type_marker = TYPE_MARKER
            .get_or_init(|| Regex::new(r"(?i)^\s*TYPE:\s*(.+?)\s*$").expect("invalid regex pattern"));

        if let Some(captures) = type_marker.captures(comment) {
            let value = captures.get(1).map_or("", |m| m.as_str());
            return Some(Annotation::Feature(FeatureType::from_type_marker(value)));
        }

        FeatureType::from_simplify3d(comment).map(Annotation::Feature)
    }
}

impl Default for CommentProcessor {
    fn default() -> Self {
        // The default prefix is a fixed literal, so construction cannot fail.
        match Self::new(&CommentArgs::default()) {
            Ok(processor) => processor,
            Err(e) => unreachable!("default comment args rejected: {e}"),
        }
    }
}
