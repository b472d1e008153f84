#![no_main]
use libfuzzer_sys::fuzz_target;
use tapejson::bench_helpers::{parse_string, StringRef};

fuzz_target!(|data: &[u8]| {
    if data.first() != Some(&b'"') {
        return;
    }
    let mut strings = Vec::new();
    if let Ok(StringRef::Buffered { offset, len }) =
        parse_string(data, 0, data.len(), &mut strings)
    {
        // prefix, bytes, NUL layout must hold
        let stored = u32::from_le_bytes(strings[offset..offset + 4].try_into().unwrap());
        assert_eq!(stored as usize, len);
        assert_eq!(strings[offset + 4 + len], 0);
    }
});
