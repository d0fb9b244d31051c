//! Parse → reassemble → parse preserves opcode and parameter set

use lapsekit_parser::{GcodeParser, ParameterValue, ParsedCommand};
use proptest::prelude::*;

fn parse(parser: &GcodeParser, line: &str) -> ParsedCommand {
    parser
        .parse_line(line, 0)
        .expect("line should parse")
        .command()
        .cloned()
        .expect("line should carry a command")
}

fn opcode_and_letters() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop::sample::select(vec![
        ("G0", "XYZF"),
        ("G1", "XYZEF"),
        ("G92", "XYZE"),
        ("M104", "ST"),
        ("M106", "SP"),
        ("G4", "PS"),
        ("M900", "KLT"),
    ])
}

fn line_strategy() -> impl Strategy<Value = String> {
    opcode_and_letters().prop_flat_map(|(opcode, letters)| {
        let letters: Vec<char> = letters.chars().collect();
        let count = letters.len();
        (
            Just(opcode),
            prop::sample::subsequence(letters, 0..=count),
            prop::collection::vec(-10_000.0f64..10_000.0, count),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(opcode, letters, values, compact, lower)| {
                let mut line = opcode.to_string();
                for (letter, value) in letters.iter().zip(values) {
                    // A glued `E` after a number reads as an exponent
                    if !compact || *letter == 'E' {
                        line.push(' ');
                    }
                    line.push_str(&format!("{}{}", letter, value));
                }
                if lower {
                    line.to_lowercase()
                } else {
                    line
                }
            })
    })
}

proptest! {
    #[test]
    fn reassembled_line_parses_to_same_command(line in line_strategy()) {
        let parser = GcodeParser::default();
        let first = parse(&parser, &line);
        let reassembled = first.to_string();
        let second = parse(&parser, &reassembled);

        prop_assert_eq!(&first.command, &second.command);
        prop_assert_eq!(&first.parameters, &second.parameters);
    }

    #[test]
    fn numeric_values_survive_formatting(value in -1.0e6f64..1.0e6) {
        let parser = GcodeParser::default();
        let cmd = parse(&parser, &format!("G1 X{}", value));
        prop_assert_eq!(cmd.get('X'), Some(&ParameterValue::Number(value)));
    }
}

#[test]
fn test_comment_and_checksum_do_not_change_semantics() {
    let parser = GcodeParser::default();
    let plain = parse(&parser, "G1 X10 Y20 F3000");
    let decorated = parse(&parser, "N7 g1x10 y20 (fast) f3000*12 ; travel");

    assert_eq!(plain.command, decorated.command);
    assert_eq!(plain.parameters, decorated.parameters);
    assert_eq!(decorated.gcode_line_number, Some(7));
}

#[test]
fn test_parsed_line_serializes() {
    let parser = GcodeParser::default();
    let parsed = parser.parse_line("G1 X1 ; @LAPSE SUPPRESS-START", 3).unwrap();
    let json = serde_json::to_string(&parsed).unwrap();
    assert!(json.contains("SuppressStart"));
    assert!(json.contains("\"line_index\":3"));
}
