// End-to-end conformance tests: the concrete tape scenarios of the format
// contract, boundary behaviors around the 64-byte block size, and
// round-trips through the serializer.

use tapejson::{ParseError, ParsedJson, TapeTag, STRING_IN_PLACE_BIT};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse(input: &[u8]) -> Result<ParsedJson, ParseError> {
    let mut pj = ParsedJson::with_capacity(input.len());
    tapejson::parse(input, &mut pj)?;
    Ok(pj)
}

fn parse_nd(input: &[u8]) -> Result<ParsedJson, ParseError> {
    let mut pj = ParsedJson::with_capacity(input.len());
    tapejson::parse_lines(input, &mut pj)?;
    Ok(pj)
}

fn dump(input: &[u8]) -> Vec<u8> {
    parse(input).unwrap().dump_json(input)
}

/// Tag sequence of a tape, skipping payload words.
fn tags(pj: &ParsedJson) -> Vec<TapeTag> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < pj.tape.len() {
        let (tag, _) = pj.entry(i).expect("well-formed tape");
        out.push(tag);
        i += match tag {
            TapeTag::String | TapeTag::Int64 | TapeTag::Uint64 | TapeTag::Float64 => 2,
            _ => 1,
        };
    }
    out
}

// ---------------------------------------------------------------------------
// Concrete tape scenarios
// ---------------------------------------------------------------------------

#[test]
fn empty_object() {
    let pj = parse(b"{}").unwrap();
    assert_eq!(pj.tape.len(), 3);
    assert_eq!(pj.entry(0), Some((TapeTag::Root, 3)));
    assert_eq!(pj.entry(1), Some((TapeTag::ObjectOpen, 2)));
    assert_eq!(pj.entry(2), Some((TapeTag::ObjectClose, 1)));
}

#[test]
fn object_with_string_values() {
    let input = br#"{"a":"b"}"#;
    let pj = parse(input).unwrap();
    assert_eq!(
        tags(&pj),
        vec![
            TapeTag::Root,
            TapeTag::ObjectOpen,
            TapeTag::String,
            TapeTag::String,
            TapeTag::ObjectClose,
        ]
    );
    assert_eq!(pj.string_bytes(input, 2), Some(&b"a"[..]));
    assert_eq!(pj.string_bytes(input, 4), Some(&b"b"[..]));
}

#[test]
fn array_of_integers() {
    let pj = parse(b"[1,2,3]").unwrap();
    assert_eq!(pj.entry(0), Some((TapeTag::Root, 9)));
    assert_eq!(pj.entry(1), Some((TapeTag::ArrayOpen, 8)));
    assert_eq!(
        (pj.tape[3], pj.tape[5], pj.tape[7]),
        (1u64, 2u64, 3u64)
    );
    assert_eq!(pj.entry(8), Some((TapeTag::ArrayClose, 1)));
}

#[test]
fn object_with_atoms() {
    let pj = parse(br#"{"a":true,"b":false,"c":null}"#).unwrap();
    assert_eq!(
        tags(&pj),
        vec![
            TapeTag::Root,
            TapeTag::ObjectOpen,
            TapeTag::String,
            TapeTag::True,
            TapeTag::String,
            TapeTag::False,
            TapeTag::String,
            TapeTag::Null,
            TapeTag::ObjectClose,
        ]
    );
}

#[test]
fn unicode_escape_goes_through_the_string_buffer() {
    let input = br#"{"x":"y\u20AC"}"#;
    let pj = parse(input).unwrap();
    // entries: root, {, "x"+len, decoded euro string+len, }
    let (tag, payload) = pj.entry(4).unwrap();
    assert_eq!(tag, TapeTag::String);
    assert_eq!(payload & STRING_IN_PLACE_BIT, 0, "escaped string must be buffered");
    assert_eq!(pj.string_bytes(input, 4), Some(&b"y\xE2\x82\xAC"[..]));
    // the clean key is referenced in place
    let (_, key_payload) = pj.entry(2).unwrap();
    assert_ne!(key_payload & STRING_IN_PLACE_BIT, 0);
}

#[test]
fn line_delimited_roots_chain_to_each_other() {
    let input = b"\"a\"\n\"b\"\n\"c\"";
    let pj = parse_nd(input).unwrap();
    assert_eq!(pj.entry(0), Some((TapeTag::Root, 3)));
    assert_eq!(pj.entry(3), Some((TapeTag::Root, 6)));
    assert_eq!(pj.entry(6), Some((TapeTag::Root, 9)));
    assert_eq!(pj.tape.len(), 9);
    assert_eq!(pj.string_bytes(input, 1), Some(&b"a"[..]));
    assert_eq!(pj.string_bytes(input, 7), Some(&b"c"[..]));
}

#[test]
fn control_byte_inside_string_fails_in_stage_one() {
    let mut input = br#"{"a":""#.to_vec();
    input.push(0x07);
    input.extend_from_slice(b"\"}");
    assert_eq!(
        parse(&input).unwrap_err(),
        ParseError::ControlCharacterInString
    );
}

#[test]
fn missing_closing_brace_fails() {
    assert!(parse(br#"{"a":"b""#).is_err());
}

// ---------------------------------------------------------------------------
// Boundary behaviors around the 64-byte block size
// ---------------------------------------------------------------------------

#[test]
fn trailing_space_padding_changes_nothing() {
    let doc = br#"{"k": [1, 2.5, "three", {"four": null}], "t": true}"#;
    let base = parse(doc).unwrap();
    for target in [64usize, 65, 96, 97, 127, 128] {
        let mut padded = doc.to_vec();
        padded.resize(target, b' ');
        let pj = parse(&padded).unwrap();
        assert_eq!(pj.tape, base.tape, "len {target}");
        assert_eq!(pj.dump_json(&padded), base.dump_json(doc), "len {target}");
    }
}

#[test]
fn input_lengths_around_block_multiples() {
    // array of 'x' strings grown so total length sweeps block boundaries
    for extra in 0..130 {
        let mut doc = Vec::from(&b"[\"start\""[..]);
        for i in 0..extra {
            doc.extend_from_slice(b",\"");
            doc.push(b'a' + (i % 26) as u8);
            doc.push(b'"');
        }
        doc.push(b']');
        let pj = parse(&doc).unwrap();
        assert_eq!(pj.entry(1).unwrap().0, TapeTag::ArrayOpen);
    }
}

#[test]
fn backslash_runs_straddling_blocks() {
    // "aaaa...\\\\..." with the run crossing byte 64, all parities up to 16
    for run in 1..=16usize {
        let mut doc = Vec::from(&b"[\""[..]);
        while doc.len() < 64 - run / 2 {
            doc.push(b'a');
        }
        for _ in 0..run {
            doc.extend_from_slice(b"\\\\");
        }
        doc.extend_from_slice(b"\"]");
        let pj = parse(&doc).unwrap();
        let decoded = pj.string_bytes(&doc, 2).unwrap();
        assert_eq!(decoded.iter().filter(|&&b| b == b'\\').count(), run);
    }
}

#[test]
fn strings_longer_than_a_block() {
    let body: Vec<u8> = (0..200).map(|i| b'a' + (i % 26) as u8).collect();
    let mut doc = Vec::from(&b"[\""[..]);
    doc.extend_from_slice(&body);
    doc.extend_from_slice(b"\"]");
    let pj = parse(&doc).unwrap();
    assert_eq!(pj.string_bytes(&doc, 2), Some(&body[..]));
}

#[test]
fn string_with_every_printable_ascii_byte() {
    let mut body = String::new();
    for b in 0x20u8..=0x7E {
        match b {
            b'"' => body.push_str("\\\""),
            b'\\' => body.push_str("\\\\"),
            other => body.push(other as char),
        }
    }
    let doc = format!("[\"{body}\"]").into_bytes();
    let pj = parse(&doc).unwrap();
    let decoded = pj.string_bytes(&doc, 2).unwrap();
    assert_eq!(decoded.len(), 0x7E - 0x20 + 1);
    assert_eq!(decoded[0], 0x20);
    assert_eq!(decoded[decoded.len() - 1], 0x7E);
}

#[test]
fn adjacent_escaped_quote_and_backslash() {
    let doc = br#"["\"\\"]"#;
    let pj = parse(doc).unwrap();
    assert_eq!(pj.string_bytes(doc, 2), Some(&b"\"\\"[..]));
}

// ---------------------------------------------------------------------------
// Root scalars, wide numbers, deep nesting
// ---------------------------------------------------------------------------

#[test]
fn scalar_roots() {
    assert_eq!(tags(&parse(b"42").unwrap()), vec![TapeTag::Root, TapeTag::Int64]);
    assert_eq!(
        tags(&parse(b"\"hi\"").unwrap()),
        vec![TapeTag::Root, TapeTag::String]
    );
    assert_eq!(tags(&parse(b"true").unwrap()), vec![TapeTag::Root, TapeTag::True]);
    assert_eq!(tags(&parse(b" null ").unwrap()), vec![TapeTag::Root, TapeTag::Null]);
}

#[test]
fn number_classification_on_the_tape() {
    let doc = b"[1, 9223372036854775808, 2.5, -3]";
    let pj = parse(doc).unwrap();
    assert_eq!(
        tags(&pj),
        vec![
            TapeTag::Root,
            TapeTag::ArrayOpen,
            TapeTag::Int64,
            TapeTag::Uint64,
            TapeTag::Float64,
            TapeTag::Int64,
            TapeTag::ArrayClose,
        ]
    );
    assert_eq!(pj.tape[3], 1);
    assert_eq!(pj.tape[5], 9_223_372_036_854_775_808u64);
    assert_eq!(f64::from_bits(pj.tape[7]), 2.5);
    assert_eq!(pj.tape[9] as i64, -3);
}

#[test]
fn deeply_nested_arrays() {
    let depth = 2_000;
    let mut doc = Vec::with_capacity(depth * 2);
    doc.extend(std::iter::repeat(b'[').take(depth));
    doc.extend(std::iter::repeat(b']').take(depth));
    let pj = parse(&doc).unwrap();
    assert_eq!(pj.tape.len(), depth * 2 + 1);
    // serializer is iterative too
    assert_eq!(pj.dump_json(&doc), doc);
}

// ---------------------------------------------------------------------------
// Round-trips
// ---------------------------------------------------------------------------

#[test]
fn round_trip_is_stable() {
    let cases: &[&[u8]] = &[
        br#"{"a":"b"}"#,
        br#"[1,2,3]"#,
        br#"{"a":true,"b":false,"c":null}"#,
        br#"{"nested":{"deep":[[],{},[0.5,-7,"s"]]},"end":"\n"}"#,
        br#"[18446744073709551615,-9223372036854775808]"#,
    ];
    for case in cases {
        let first = dump(case);
        let second = dump(&first);
        assert_eq!(first, second, "case {:?}", String::from_utf8_lossy(case));
    }
}

#[test]
fn whitespace_variants_serialize_identically() {
    let compact = br#"{"a":[1,{"b":null}],"c":"d"}"#;
    let pretty = b"{\n  \"a\": [ 1, { \"b\" : null } ],\r\n  \"c\":\t\"d\"\n}";
    assert_eq!(dump(compact), dump(pretty));
    let base = parse(compact).unwrap();
    let spaced = parse(pretty).unwrap();
    assert_eq!(tags(&base), tags(&spaced));
}

#[test]
fn line_delimited_round_trip() {
    let input = b"{\"a\":1}\n\n[2,3]\n\"four\"";
    let pj = parse_nd(input).unwrap();
    assert_eq!(pj.dump_json(input), b"{\"a\":1}\n[2,3]\n\"four\"".to_vec());
}

#[test]
fn line_delimited_trailing_and_blank_lines() {
    let pj = parse_nd(b"1\n\n\n2\n").unwrap();
    let roots = tags(&pj)
        .into_iter()
        .filter(|t| *t == TapeTag::Root)
        .count();
    assert_eq!(roots, 2);
}

// ---------------------------------------------------------------------------
// Error surface
// ---------------------------------------------------------------------------

#[test]
fn malformed_documents_fail() {
    let cases: &[&[u8]] = &[
        b"",
        b"   ",
        b"{",
        b"}",
        b"[1,",
        b"[1 2]",
        br#"{"a"}"#,
        br#"{"a":}"#,
        br#"{:1}"#,
        b"[01]",
        b"[1.]",
        b"[+1]",
        b"tru",
        b"[nulll]",
        br#"["\x"]"#,
        br#"["\u12"]"#,
        br#"["\uD800"]"#,
        b"[\"\xff\"]",
        b"{\"a\":1} extra",
    ];
    for case in cases {
        assert!(
            parse(case).is_err(),
            "expected failure: {:?}",
            String::from_utf8_lossy(case)
        );
    }
}

#[test]
fn error_positions_point_into_the_input() {
    assert_eq!(parse(b"[1 2]").unwrap_err(), ParseError::ExpectedArraySeparator(3));
    assert_eq!(parse(br#"{"a" 1}"#).unwrap_err(), ParseError::ExpectedColon(5));
    assert_eq!(parse(b"[012]").unwrap_err(), ParseError::InvalidNumber(1));
}
