//! Stateless G-code line parser
//!
//! Each call to [`GcodeParser::parse_line`] looks at one line only. The
//! tokenizer tolerates missing whitespace between words (`G1X10Y20`),
//! lower-case input, `N` line-number prefixes, and trailing `*` checksums.

use std::sync::Arc;

use lapsekit_core::{ParseError, ParseErrorKind};

use crate::command::{LineKind, ParameterValue, ParsedCommand, ParsedLine};
use crate::comments::CommentProcessor;
use crate::grammar::CommandGrammar;

/// G-code parser bound to a dialect table and a comment processor
#[derive(Debug, Clone)]
pub struct GcodeParser {
    grammar: Arc<CommandGrammar>,
    comments: CommentProcessor,
}

impl GcodeParser {
    /// Create a parser
    pub fn new(grammar: Arc<CommandGrammar>, comments: CommentProcessor) -> Self {
        Self { grammar, comments }
    }

    /// The dialect table in use
    pub fn grammar(&self) -> &CommandGrammar {
        &self.grammar
    }

    /// The comment processor in use
    pub fn comments(&self) -> &CommentProcessor {
        &self.comments
    }

    /// Parse one line
    ///
    /// Blank, comment-only, and host-command lines yield [`LineKind::NoOp`].
    pub fn parse_line(&self, line: &str, line_index: usize) -> Result<ParsedLine, ParseError> {
        let split = self.comments.split(line);

        let kind = if split.code.is_empty() {
            LineKind::NoOp
        } else {
            LineKind::Command(self.parse_code(&split.code, line, line_index)?)
        };

        Ok(ParsedLine {
            line_index,
            kind,
            annotations: split.annotations,
        })
    }

    /// Tokenize the executable portion of a line
    fn parse_code(
        &self,
        code: &str,
        line: &str,
        line_index: usize,
    ) -> Result<ParsedCommand, ParseError> {
        let error = |kind: ParseErrorKind| ParseError::new(kind, line_index, line);
        let unrecognized = |token: &str| {
            error(ParseErrorKind::UnrecognizedToken {
                token: token.to_string(),
            })
        };

        let (code, checksum) = split_checksum(code).map_err(|token| unrecognized(&token))?;
        let mut scanner = Scanner::new(code);

        // Optional N line number
        let mut gcode_line_number = None;
        scanner.skip_whitespace();
        if scanner.peek().is_some_and(|c| c.eq_ignore_ascii_case(&'N'))
            && scanner.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
        {
            scanner.advance();
            let digits = scanner.take_while(|c| c.is_ascii_digit());
            gcode_line_number = Some(digits.parse::<u64>().map_err(|_| unrecognized(digits))?);
            scanner.skip_whitespace();
        }

        if scanner.is_empty() {
            // A bare line number carries no command.
            return Err(error(ParseErrorKind::MissingOpcode));
        }

        if let Some(command) = self.parse_extended(scanner.rest(), line, line_index) {
            let mut command = command.map_err(|token| unrecognized(&token))?;
            command.gcode_line_number = gcode_line_number;
            command.checksum = checksum;
            return Ok(command);
        }

        let opcode = parse_opcode(&mut scanner).map_err(&error)?;
        let mut command = ParsedCommand::new(opcode, line, line_index);
        command.gcode_line_number = gcode_line_number;
        command.checksum = checksum;

        if self.grammar.takes_text(&command.command) {
            let text = scanner.rest().trim();
            if !text.is_empty() {
                command.text = Some(text.to_string());
            }
            return Ok(command);
        }

        loop {
            scanner.skip_whitespace();
            let Some(c) = scanner.peek() else {
                break;
            };
            if !c.is_ascii_alphabetic() {
                let token = scanner.take_while(|c| !c.is_whitespace());
                return Err(unrecognized(token));
            }

            scanner.advance();
            let letter = c.to_ascii_uppercase();
            let value = match scanner.peek() {
                Some('"') => {
                    let text = scanner
                        .take_quoted()
                        .ok_or_else(|| unrecognized(&format!("{}{}", c, scanner.rest())))?;
                    ParameterValue::Text(text)
                }
                _ => {
                    let literal = scanner.take_number();
                    if literal.is_empty() {
                        ParameterValue::Flag
                    } else {
                        ParameterValue::Number(parse_number(letter, literal).map_err(&error)?)
                    }
                }
            };

            if !self.grammar.accepts(&command.command, letter) {
                return Err(unrecognized(&letter.to_string()));
            }
            command.set_parameter(letter, value);
        }

        Ok(command)
    }

    /// Parse `NAME KEY=VALUE ...` extended commands
    ///
    /// Returns `None` when the line does not start with an extended name.
    fn parse_extended(
        &self,
        code: &str,
        line: &str,
        line_index: usize,
    ) -> Option<Result<ParsedCommand, String>> {
        let mut tokens = code.split_whitespace();
        let name = tokens.next()?;
        let mut chars = name.chars();
        let first = chars.next()?;
        let second = chars.next()?;
        if !first.is_ascii_alphabetic() || !(second.is_ascii_alphabetic() || second == '_') {
            return None;
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Some(Err(name.to_string()));
        }

        let mut command = ParsedCommand::new(name.to_ascii_uppercase(), line, line_index);
        for token in tokens {
            match token.split_once('=') {
                Some((key, _)) if key.is_empty() => return Some(Err(token.to_string())),
                Some((key, value)) => command
                    .arguments
                    .push((key.to_ascii_uppercase(), value.to_string())),
                None => command
                    .arguments
                    .push((token.to_ascii_uppercase(), String::new())),
            }
        }
        Some(Ok(command))
    }
}

impl Default for GcodeParser {
    fn default() -> Self {
        Self::new(Arc::new(CommandGrammar::standard()), CommentProcessor::default())
    }
}

/// Remove a trailing `*<checksum>`
fn split_checksum(code: &str) -> Result<(&str, Option<u8>), String> {
    match code.rfind('*') {
        Some(pos) => {
            let digits = code[pos + 1..].trim();
            let checksum = digits
                .parse::<u8>()
                .map_err(|_| code[pos..].trim().to_string())?;
            Ok((code[..pos].trim_end(), Some(checksum)))
        }
        None => Ok((code, None)),
    }
}

/// Read and normalise the command word (`g01` → `G1`, `G92.1`, `T0`)
fn parse_opcode(scanner: &mut Scanner<'_>) -> Result<String, ParseErrorKind> {
    let Some(letter) = scanner.peek() else {
        return Err(ParseErrorKind::MissingOpcode);
    };
    let letter = letter.to_ascii_uppercase();
    if !matches!(letter, 'G' | 'M' | 'T') {
        if letter.is_ascii_alphabetic() {
            return Err(ParseErrorKind::MissingOpcode);
        }
        let token = scanner.take_while(|c| !c.is_whitespace());
        return Err(ParseErrorKind::UnrecognizedToken {
            token: token.to_string(),
        });
    }
    scanner.advance();

    let number = scanner.take_while(|c| c.is_ascii_digit());
    if number.is_empty() {
        let token = scanner.take_while(|c| !c.is_whitespace());
        return Err(ParseErrorKind::UnrecognizedToken {
            token: format!("{}{}", letter, token),
        });
    }
    let major = number.trim_start_matches('0');
    let major = if major.is_empty() { "0" } else { major };

    let mut opcode = format!("{}{}", letter, major);
    if scanner.peek() == Some('.') && scanner.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
        scanner.advance();
        let sub = scanner.take_while(|c| c.is_ascii_digit());
        opcode.push('.');
        opcode.push_str(sub);
    }
    Ok(opcode)
}

/// Parse a numeric literal as `f64`
fn parse_number(letter: char, literal: &str) -> Result<f64, ParseErrorKind> {
    let unsigned = literal.strip_prefix(['-', '+']).unwrap_or(literal);
    let (digits, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };
    let exponent_ok = exponent.map_or(true, |e| {
        let e = e.strip_prefix(['-', '+']).unwrap_or(e);
        !e.is_empty() && e.chars().all(|c| c.is_ascii_digit())
    });
    let well_formed = !digits.is_empty()
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits != "."
        && exponent_ok;
    if !well_formed {
        return Err(ParseErrorKind::UnrecognizedToken {
            token: format!("{}{}", letter, literal),
        });
    }

    let value: f64 = literal
        .parse()
        .map_err(|_| ParseErrorKind::UnrecognizedToken {
            token: format!("{}{}", letter, literal),
        })?;
    if !value.is_finite() {
        return Err(ParseErrorKind::NumericOverflow {
            letter,
            literal: literal.to_string(),
        });
    }
    Ok(value)
}

/// Character cursor over the executable portion of a line
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn is_empty(&self) -> bool {
        self.rest().is_empty()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !predicate(*c))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += len;
        &rest[..len]
    }

    /// Read a numeric literal, including an `e`/`E` exponent only when digits follow it
    fn take_number(&mut self) -> &'a str {
        let start = self.pos;
        let mantissa = self.take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
        if mantissa.chars().any(|c| c.is_ascii_digit()) && matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_nth(1), Some('-' | '+')));
            if self.peek_nth(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.take_while(|c| c.is_ascii_digit());
            }
        }
        &self.text[start..self.pos]
    }

    /// Read a `"..."` string; `None` when unterminated
    fn take_quoted(&mut self) -> Option<String> {
        let rest = self.rest();
        let body = rest.strip_prefix('"')?;
        let end = body.find('"')?;
        self.pos += end + 2;
        Some(body[..end].to_string())
    }
}
