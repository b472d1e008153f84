// ============================================================================
// Stage 1: structural index extraction
// ============================================================================
//
// Walks the input in 64-byte blocks, turns each block into bitmasks via the
// kernels in `simd_utils`, threads the carried state (backslash parity,
// in-string word, pseudo-predecessor bit) across blocks, and flattens the
// finalized structural masks into 32-bit forward deltas shipped to stage 2
// through a bounded channel.

use crate::error::ParseError;
use crate::simd_utils::{self, BlockClasses, BLOCK};
use crossbeam_channel::Sender;

/// Capacity of one index slab, in 32-bit deltas.
pub const SLAB_CAPACITY: usize = 16 * 1024;

/// Bound of the slab channel. Full slabs queue here; a full queue suspends
/// the producer, an empty one suspends the consumer.
pub const SLAB_CHANNEL_BOUND: usize = 8;

/// A batch of forward deltas between consecutive structural positions.
///
/// Prefix-summing the deltas of all slabs in shipping order, starting from
/// the synthetic predecessor position -1, yields the absolute byte offset of
/// every structural and pseudo-structural byte in document order. Slabs are
/// moved through the channel by value and dropped by the consumer once
/// drained.
#[derive(Debug, Default)]
pub struct IndexSlab {
    deltas: Vec<u32>,
}

impl IndexSlab {
    fn with_capacity() -> Self {
        Self {
            deltas: Vec::with_capacity(SLAB_CAPACITY),
        }
    }

    /// True when the slab cannot hold another full block of emissions.
    fn is_full(&self) -> bool {
        self.deltas.len() + BLOCK > SLAB_CAPACITY
    }

    pub fn deltas(&self) -> &[u32] {
        &self.deltas
    }
}

// ---------------------------------------------------------------------------
// Carried block state and mask algebra
// ---------------------------------------------------------------------------

/// State threaded across 64-byte blocks.
struct BlockState {
    /// 1 iff the previous block ended inside an odd-length backslash run.
    odd_trailing_backslash: u64,
    /// All-ones iff the first byte of the next block is inside a string;
    /// never a mixed value.
    inside_quote: u64,
    /// 1 iff the last byte emitted so far was whitespace or structural. The
    /// first byte of the document is treated as following whitespace.
    pseudo_predecessor: u64,
    /// Sticky mask of string-content violations (control bytes in strings).
    error: u64,
}

impl BlockState {
    fn new() -> Self {
        Self {
            odd_trailing_backslash: 0,
            inside_quote: 0,
            pseudo_predecessor: 1,
            error: 0,
        }
    }

    /// Mask of characters escaped by an odd-length backslash run.
    ///
    /// Runs are split by the parity of their starting position; a run whose
    /// length is odd escapes the byte just past its end. A run continuing
    /// from the previous block has its parity flipped through
    /// `odd_trailing_backslash`.
    fn odd_backslash_ends(&mut self, backslashes: u64) -> u64 {
        const EVEN_BITS: u64 = 0x5555_5555_5555_5555;
        const ODD_BITS: u64 = !EVEN_BITS;

        let start_edges = backslashes & !(backslashes << 1);
        // A carried odd-length run flips the parity sense of the first run.
        let even_start_mask = EVEN_BITS ^ self.odd_trailing_backslash;
        let even_starts = start_edges & even_start_mask;
        let odd_starts = start_edges & !even_start_mask;

        let even_carries = backslashes.wrapping_add(even_starts);
        let (mut odd_carries, ends_odd) = backslashes.overflowing_add(odd_starts);
        // A carried run may also end at bit 0 of this block.
        odd_carries |= self.odd_trailing_backslash;
        self.odd_trailing_backslash = u64::from(ends_odd);

        let even_carry_ends = even_carries & !backslashes;
        let odd_carry_ends = odd_carries & !backslashes;
        (even_carry_ends & ODD_BITS) | (odd_carry_ends & EVEN_BITS)
    }

    /// Compute the unescaped quote bits and the string-interior mask, fold
    /// control-byte violations into the error mask, and update the carried
    /// in-string word.
    fn string_mask(&mut self, classes: &BlockClasses, odd_ends: u64) -> (u64, u64) {
        let quote_bits = classes.quotes & !odd_ends;
        let mut quote_mask = simd_utils::prefix_xor(quote_bits);
        quote_mask ^= self.inside_quote;
        // sign-extend the final bit: all-ones iff the block ends in-string
        self.inside_quote = ((quote_mask as i64) >> 63) as u64;
        self.error |= classes.controls & quote_mask;
        (quote_bits, quote_mask)
    }

    /// Finalize the structural mask for one block: drop in-string
    /// structurals, re-admit quote bits, add pseudo-structural starts, and
    /// strip closing quotes.
    ///
    /// Both quote bits participate in the predecessor mask so that a
    /// primitive glued to a closing quote (`"a"true`) still gets indexed and
    /// rejected downstream; only the opening quote survives into the final
    /// mask.
    fn finalize(&mut self, classes: &BlockClasses, quote_bits: u64, quote_mask: u64) -> u64 {
        let mut structurals = classes.structurals & !quote_mask;
        structurals |= quote_bits;

        let predecessors = structurals | classes.whitespace;
        let shifted = (predecessors << 1) | self.pseudo_predecessor;
        self.pseudo_predecessor = predecessors >> 63;
        let pseudo_structurals = shifted & !classes.whitespace & !quote_mask;
        structurals |= pseudo_structurals;

        structurals & !(quote_bits & !quote_mask)
    }
}

// ---------------------------------------------------------------------------
// Bit flattener
// ---------------------------------------------------------------------------

/// Expands finalized structural masks into forward deltas.
///
/// The carry across blocks is held as the absolute offset of the last
/// emitted index, seeded with the synthetic predecessor position -1: the
/// first delta of the document then prefix-sums to the offset of its first
/// structural byte. A block with an empty mask emits nothing; the gap is
/// absorbed by the next emission's delta.
struct Flattener {
    last_emitted: i64,
}

impl Flattener {
    fn new() -> Self {
        Self { last_emitted: -1 }
    }

    fn flatten(&mut self, block_start: u64, mut mask: u64, slab: &mut IndexSlab) {
        while mask != 0 {
            let abs = block_start + mask.trailing_zeros() as u64;
            slab.deltas.push((abs as i64 - self.last_emitted) as u32);
            self.last_emitted = abs as i64;
            mask &= mask - 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Block driver
// ---------------------------------------------------------------------------

/// Scan `input` and ship index slabs on `tx`.
///
/// Returns the Stage 1 verdict: any string-content violation, an unclosed
/// string at end of input, a bracketed document whose last non-whitespace
/// byte does not match its opener, or a document with no structural content
/// at all fails here. When the consumer hangs up early the remaining blocks
/// are abandoned without an error; the consumer owns the verdict in that
/// case.
pub(crate) fn find_structural_indices(
    input: &[u8],
    line_delimited: bool,
    tx: Sender<IndexSlab>,
) -> Result<(), ParseError> {
    if simdutf8::basic::from_utf8(input).is_err() {
        return Err(ParseError::InvalidUtf8);
    }

    let mut state = BlockState::new();
    let mut flattener = Flattener::new();
    let mut slab = IndexSlab::with_capacity();
    let mut emitted: u64 = 0;
    let mut block_start: u64 = 0;

    let process = |block: &[u8; BLOCK],
                       block_start: u64,
                       state: &mut BlockState,
                       flattener: &mut Flattener,
                       slab: &mut IndexSlab| {
        let classes = simd_utils::classify(block);
        let odd_ends = state.odd_backslash_ends(classes.backslashes);
        let (quote_bits, quote_mask) = state.string_mask(&classes, odd_ends);
        let mut structurals = state.finalize(&classes, quote_bits, quote_mask);
        if line_delimited {
            structurals |= classes.newlines & !quote_mask;
        }
        flattener.flatten(block_start, structurals, slab);
        structurals.count_ones() as u64
    };

    let mut chunks = input.chunks_exact(BLOCK);
    for chunk in &mut chunks {
        let block: &[u8; BLOCK] = chunk.try_into().expect("chunks_exact yields full blocks");
        emitted += process(block, block_start, &mut state, &mut flattener, &mut slab);
        block_start += BLOCK as u64;

        if slab.is_full() {
            let full = std::mem::replace(&mut slab, IndexSlab::with_capacity());
            if tx.send(full).is_err() {
                // Consumer hit an error and hung up; abandon the rest.
                return Ok(());
            }
        }
    }

    // Tail: pad the remainder with spaces to a full block. The padding keeps
    // the kernels on whole blocks and lets an open string at end of input
    // surface through `inside_quote`.
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut scratch = [b' '; BLOCK];
        scratch[..remainder.len()].copy_from_slice(remainder);
        emitted += process(&scratch, block_start, &mut state, &mut flattener, &mut slab);
    }

    log::trace!(
        "structural scan: {} bytes, {} indices",
        input.len(),
        emitted
    );

    if state.error != 0 {
        return Err(ParseError::ControlCharacterInString);
    }
    if state.inside_quote != 0 {
        return Err(ParseError::UnterminatedString);
    }
    if !line_delimited {
        check_outer_bracket(input)?;
    }
    if emitted == 0 {
        return Err(ParseError::EmptyDocument);
    }

    if !slab.deltas.is_empty() {
        let _ = tx.send(slab);
    }
    Ok(())
}

/// For documents opening with a bracket, the last non-whitespace byte must
/// be the matching close bracket. Scalar roots carry no such obligation.
fn check_outer_bracket(input: &[u8]) -> Result<(), ParseError> {
    let is_ws = |b: &&u8| matches!(**b, b' ' | b'\t' | b'\n' | b'\r');
    let first = input.iter().find(|b| !is_ws(b)).copied();
    let last = input.iter().rev().find(|b| !is_ws(b)).copied();
    match (first, last) {
        (Some(b'{'), Some(l)) if l != b'}' => Err(ParseError::MismatchedOuterBracket),
        (Some(b'['), Some(l)) if l != b']' => Err(ParseError::MismatchedOuterBracket),
        _ => Ok(()),
    }
}

/// Run Stage 1 standalone and return the absolute structural offsets.
#[cfg(any(test, feature = "bench"))]
pub fn structural_indices(input: &[u8], line_delimited: bool) -> Result<Vec<u64>, ParseError> {
    let (tx, rx) = crossbeam_channel::unbounded();
    find_structural_indices(input, line_delimited, tx)?;
    let mut offsets = Vec::new();
    let mut abs: i64 = -1;
    for slab in rx.iter() {
        for &delta in slab.deltas() {
            abs += delta as i64;
            offsets.push(abs as u64);
        }
    }
    Ok(offsets)
}
