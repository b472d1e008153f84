#![no_main]
use libfuzzer_sys::fuzz_target;
use tapejson::bench_helpers::structural_indices;

fuzz_target!(|data: &[u8]| {
    if let Ok(offsets) = structural_indices(data, false) {
        // offsets must be strictly increasing and in bounds
        let mut prev = None;
        for &off in &offsets {
            assert!((off as usize) < data.len());
            if let Some(p) = prev {
                assert!(off > p);
            }
            prev = Some(off);
        }
    }
    let _ = structural_indices(data, true);
});
