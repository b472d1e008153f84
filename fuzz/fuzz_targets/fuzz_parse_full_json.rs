#![no_main]
use libfuzzer_sys::fuzz_target;
use tapejson::ParsedJson;

fuzz_target!(|data: &[u8]| {
    let mut pj = ParsedJson::new();
    if tapejson::parse(data, &mut pj).is_ok() {
        // a successful parse must re-serialize and re-parse cleanly
        let dumped = pj.dump_json(data);
        let mut again = ParsedJson::new();
        tapejson::parse(&dumped, &mut again).expect("round-trip reparse");
    }
    let mut pj = ParsedJson::new();
    let _ = tapejson::parse_lines(data, &mut pj);
});
