//! Two-stage JSON parser producing a flat tape.
//!
//! Stage 1 scans the input in 64-byte blocks, computing bitmasks of
//! structural characters, string interiors, and whitespace, and flattens
//! them into a stream of byte offsets shipped over a bounded channel.
//! Stage 2 consumes that stream with a state machine that validates the
//! grammar and writes a tape: tagged 64-bit words where containers point at
//! their matching brackets and strings reference either the input (clean
//! strings) or a decoded string buffer (escaped strings).
//!
//! ```
//! let doc = br#"{"name": "tape", "sizes": [1, 2.5, true]}"#;
//! let mut pj = tapejson::ParsedJson::with_capacity(doc.len());
//! tapejson::parse(doc, &mut pj).unwrap();
//! assert_eq!(
//!     pj.dump_json(doc),
//!     br#"{"name":"tape","sizes":[1,2.5,true]}"#.to_vec()
//! );
//! ```
//!
//! Newline-delimited streams parse with [`parse_lines`]; each document gets
//! its own root entry whose payload points at the next root.

#![cfg_attr(feature = "portable-simd", feature(portable_simd))]

mod error;
mod numbers;
mod simd_utils;
mod stage1;
mod stage2;
mod strings;
mod tape;

pub use error::ParseError;
pub use tape::{ParsedJson, TapeTag, PAYLOAD_MASK, STRING_IN_PLACE_BIT};

/// Parse `input` as a single JSON document into `pj`.
///
/// Drives both stages to completion: stage 1 runs on a scoped thread,
/// stage 2 on the calling thread, coupled by a bounded channel of index
/// slabs. On failure no tape is published; `pj.strings` may hold partial
/// data that nothing references.
pub fn parse(input: &[u8], pj: &mut ParsedJson) -> Result<(), ParseError> {
    pj.line_delimited = false;
    run_stages(input, pj)
}

/// Parse `input` as newline-delimited JSON documents into `pj`.
///
/// Top-level newlines close the current document and open the next; blank
/// lines between documents are tolerated.
pub fn parse_lines(input: &[u8], pj: &mut ParsedJson) -> Result<(), ParseError> {
    pj.line_delimited = true;
    run_stages(input, pj)
}

fn run_stages(input: &[u8], pj: &mut ParsedJson) -> Result<(), ParseError> {
    pj.initialize(input.len());
    let line_delimited = pj.line_delimited;
    let (tx, rx) = crossbeam_channel::bounded(stage1::SLAB_CHANNEL_BOUND);

    let (producer_verdict, consumer_verdict) = std::thread::scope(|scope| {
        let producer =
            scope.spawn(move || stage1::find_structural_indices(input, line_delimited, tx));
        // A stage 2 error drops the receiver, which stage 1 observes as a
        // failed send and abandons its remaining blocks.
        let consumer_verdict = stage2::build_tape(input, rx, pj);
        let producer_verdict = match producer.join() {
            Ok(verdict) => verdict,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (producer_verdict, consumer_verdict)
    });

    // Stage 1's verdict wins: when it fails, stage 2 merely observed a
    // truncated stream and its complaint is derivative.
    let verdict = producer_verdict.and(consumer_verdict);
    if verdict.is_err() {
        pj.tape.clear();
    }
    verdict
}

/// Internal entry points exposed for benches and fuzz targets.
#[cfg(feature = "bench")]
pub mod bench_helpers {
    pub use crate::numbers::{parse_number, ParsedNumber};
    #[cfg(feature = "portable-simd")]
    pub use crate::simd_utils::{classify_wide256, classify_wide512};
    pub use crate::simd_utils::{classify, classify_scalar, prefix_xor, BlockClasses, BLOCK};
    pub use crate::stage1::structural_indices;
    pub use crate::strings::{parse_string, StringRef};
}
