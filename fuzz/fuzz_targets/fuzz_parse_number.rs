#![no_main]
use libfuzzer_sys::fuzz_target;
use tapejson::bench_helpers::{parse_number, ParsedNumber};

fuzz_target!(|data: &[u8]| {
    if !matches!(data.first(), Some(b'-' | b'0'..=b'9')) {
        return;
    }
    if let Ok(ParsedNumber::Double(f)) = parse_number(data, 0) {
        assert!(f.is_finite());
    }
});
