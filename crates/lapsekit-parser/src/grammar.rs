//! Table-driven command grammar
//!
//! Maps each known opcode to the parameter letters it accepts. Opcodes that
//! are not in the table accept any letter, so vendor extensions parse without
//! a table entry; adding an entry only tightens validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameter rules for one opcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRule {
    /// Accepted parameter letters (upper case)
    pub letters: String,
    /// The rest of the line is one free text argument (`M117 Hello`)
    #[serde(default)]
    pub text_argument: bool,
}

impl CommandRule {
    /// Rule accepting the given letters
    pub fn letters(letters: &str) -> Self {
        Self {
            letters: letters.to_ascii_uppercase(),
            text_argument: false,
        }
    }

    /// Rule taking the rest of the line as text
    pub fn text() -> Self {
        Self {
            letters: String::new(),
            text_argument: true,
        }
    }

    /// Check if a letter is accepted
    pub fn accepts(&self, letter: char) -> bool {
        self.letters.contains(letter.to_ascii_uppercase())
    }
}

/// Dialect table: opcode → parameter rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandGrammar {
    rules: HashMap<String, CommandRule>,
}

impl CommandGrammar {
    /// Create an empty grammar (every opcode accepts every letter)
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Grammar for common FFF firmware (Marlin, RepRapFirmware, Klipper, Prusa)
    pub fn standard() -> Self {
        let table: &[(&str, &str)] = &[
            ("G0", "XYZEFS"),
            ("G1", "XYZEFS"),
            ("G2", "XYZEFIJKRPS"),
            ("G3", "XYZEFIJKRPS"),
            ("G4", "PS"),
            ("G10", "SPLRXYZ"),
            ("G11", "S"),
            ("G20", ""),
            ("G21", ""),
            ("G28", "XYZWOR"),
            ("G90", ""),
            ("G91", ""),
            ("G92", "XYZE"),
            ("M82", ""),
            ("M83", ""),
            ("M84", "XYZES"),
            ("M104", "SRTBF"),
            ("M106", "SPT"),
            ("M107", "P"),
            ("M109", "SRTBF"),
            ("M140", "SR"),
            ("M190", "SR"),
            ("M220", "S"),
            ("M221", "ST"),
            ("M240", "PD"),
            ("M400", ""),
            ("T", "S"),
        ];

        let mut grammar = Self::empty();
        for (opcode, letters) in table {
            grammar.insert(opcode, CommandRule::letters(letters));
        }
        for opcode in ["M23", "M28", "M32", "M117", "M118"] {
            grammar.insert(opcode, CommandRule::text());
        }
        grammar
    }

    /// Add or replace a rule
    pub fn insert(&mut self, opcode: &str, rule: CommandRule) -> &mut Self {
        self.rules.insert(opcode.to_ascii_uppercase(), rule);
        self
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_rule(mut self, opcode: &str, rule: CommandRule) -> Self {
        self.insert(opcode, rule);
        self
    }

    /// Rule for a normalised opcode (`T<n>` shares the `T` rule)
    pub fn rule_for(&self, opcode: &str) -> Option<&CommandRule> {
        if let Some(rule) = self.rules.get(opcode) {
            return Some(rule);
        }
        let is_tool = opcode
            .strip_prefix('T')
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()));
        if is_tool {
            self.rules.get("T")
        } else {
            None
        }
    }

    /// Check if `letter` may follow `opcode`
    pub fn accepts(&self, opcode: &str, letter: char) -> bool {
        self.rule_for(opcode).is_none_or(|rule| rule.accepts(letter))
    }

    /// Check if `opcode` takes free text
    pub fn takes_text(&self, opcode: &str) -> bool {
        self.rule_for(opcode).is_some_and(|rule| rule.text_argument)
    }

    /// Number of opcodes in the table
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for CommandGrammar {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rules() {
        let grammar = CommandGrammar::standard();
        assert!(grammar.accepts("G1", 'X'));
        assert!(grammar.accepts("G1", 'f'));
        assert!(!grammar.accepts("G1", 'Q'));
        assert!(grammar.takes_text("M117"));
        assert!(!grammar.takes_text("G1"));
    }

    #[test]
    fn test_unknown_opcode_accepts_anything() {
        let grammar = CommandGrammar::standard();
        assert!(grammar.accepts("M900", 'K'));
        assert!(grammar.accepts("G29", 'Q'));
    }

    #[test]
    fn test_tool_rule_shared() {
        let grammar = CommandGrammar::standard();
        assert!(grammar.rule_for("T0").is_some());
        assert!(grammar.rule_for("T12").is_some());
        assert!(grammar.rule_for("TX").is_none());
        assert!(!grammar.accepts("T1", 'X'));
    }

    #[test]
    fn test_extension_without_touching_table() {
        let grammar = CommandGrammar::standard().with_rule("M900", CommandRule::letters("KLT"));
        assert!(grammar.accepts("M900", 'K'));
        assert!(!grammar.accepts("M900", 'X'));
    }
}
