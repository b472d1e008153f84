// ============================================================================
// Stage 2: tape construction
// ============================================================================
//
// Consumes the index stream produced by stage 1 and builds the tape. The
// original's goto machine is rendered as a state enum driven by a single
// loop; each transition consumes one index. Open containers live on a stack
// of (tape index, continuation) pairs, and close entries patch their opener
// by indexed write.

use crate::error::ParseError;
use crate::numbers::{self, ParsedNumber};
use crate::simd_utils::is_structural_or_whitespace;
use crate::stage1::IndexSlab;
use crate::strings::{self, StringRef};
use crate::tape::{ParsedJson, TapeTag, STRING_IN_PLACE_BIT};
use crossbeam_channel::Receiver;
use smallvec::SmallVec;

/// Which grammar state resumes once the value being parsed completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    Document,
    Object,
    Array,
}

fn continuation_state(cont: Continuation) -> State {
    match cont {
        Continuation::Document => State::DocumentEnd,
        Continuation::Object => State::ObjectContinue,
        Continuation::Array => State::ArrayContinue,
    }
}

/// Grammar states. Each arm of the main loop consumes exactly one index.
enum State {
    /// Expect the first value of a document (or a delimiter newline).
    DocumentBegin,
    /// Just opened an object: expect a key or `}`.
    ObjectBegin,
    /// After a comma in an object: expect a key.
    ObjectField,
    /// After a value in an object: expect `,` or `}`.
    ObjectContinue,
    /// Just opened an array: expect a value or `]`.
    ArrayBegin,
    /// After a comma in an array: expect a value.
    ArrayValue,
    /// After a value in an array: expect `,` or `]`.
    ArrayContinue,
    /// A top-level value finished: expect end of stream or a delimiter.
    DocumentEnd,
}

// ---------------------------------------------------------------------------
// Index stream
// ---------------------------------------------------------------------------

/// Prefix-summing reader over the slab channel, with one index of lookahead
/// so the string parser can be handed the next index as its scan bound.
/// A drained slab is dropped when its successor arrives.
struct IndexStream {
    rx: Receiver<IndexSlab>,
    slab: Option<IndexSlab>,
    pos: usize,
    last_abs: i64,
    lookahead: Option<u64>,
}

impl IndexStream {
    fn new(rx: Receiver<IndexSlab>) -> Self {
        Self {
            rx,
            slab: None,
            pos: 0,
            last_abs: -1,
            lookahead: None,
        }
    }

    fn fetch(&mut self) -> Option<u64> {
        loop {
            if let Some(slab) = &self.slab {
                if let Some(&delta) = slab.deltas().get(self.pos) {
                    self.pos += 1;
                    self.last_abs += delta as i64;
                    return Some(self.last_abs as u64);
                }
            }
            match self.rx.recv() {
                Ok(next) => {
                    self.slab = Some(next);
                    self.pos = 0;
                }
                Err(_) => {
                    self.slab = None;
                    return None;
                }
            }
        }
    }

    /// Next absolute structural offset; `None` once the channel is closed
    /// and drained.
    fn next(&mut self) -> Option<u64> {
        self.lookahead.take().or_else(|| self.fetch())
    }

    /// Peek the next offset without consuming it. May suspend on the
    /// channel like `next`.
    fn peek(&mut self) -> Option<u64> {
        if self.lookahead.is_none() {
            self.lookahead = self.fetch();
        }
        self.lookahead
    }
}

// ---------------------------------------------------------------------------
// Tape builder
// ---------------------------------------------------------------------------

struct TapeBuilder<'a, 'b> {
    input: &'a [u8],
    pj: &'b mut ParsedJson,
    stream: IndexStream,
    /// Open containers: tape offset of the opening entry plus the
    /// continuation to resume at its close.
    containers: SmallVec<[(u32, Continuation); 32]>,
    /// Tape offset of the current document's root entry.
    root: usize,
    roots: usize,
}

impl TapeBuilder<'_, '_> {
    fn build(&mut self) -> Result<(), ParseError> {
        let mut state = State::DocumentBegin;
        loop {
            state = match state {
                State::DocumentBegin => match self.stream.next() {
                    None => {
                        if self.roots == 0 {
                            return Err(ParseError::EmptyDocument);
                        }
                        // the previous root was patched when its delimiter
                        // closed it
                        return Ok(());
                    }
                    Some(idx) if self.input[idx as usize] == b'\n' => State::DocumentBegin,
                    Some(idx) => {
                        self.root = self.pj.tape.len();
                        self.roots += 1;
                        self.pj.write(TapeTag::Root, 0);
                        self.parse_value(idx, Continuation::Document)?
                    }
                },

                State::ObjectBegin => {
                    let idx = self.next_index()?;
                    match self.input[idx as usize] {
                        b'}' => self.close_container(TapeTag::ObjectClose, idx)?,
                        b'"' => self.object_field(idx)?,
                        _ => return Err(ParseError::ExpectedKey(idx as usize)),
                    }
                }

                State::ObjectField => {
                    let idx = self.next_index()?;
                    if self.input[idx as usize] != b'"' {
                        return Err(ParseError::ExpectedKey(idx as usize));
                    }
                    self.object_field(idx)?
                }

                State::ObjectContinue => {
                    let idx = self.next_index()?;
                    match self.input[idx as usize] {
                        b',' => State::ObjectField,
                        b'}' => self.close_container(TapeTag::ObjectClose, idx)?,
                        _ => return Err(ParseError::ExpectedObjectSeparator(idx as usize)),
                    }
                }

                State::ArrayBegin => {
                    let idx = self.next_index()?;
                    match self.input[idx as usize] {
                        b']' => self.close_container(TapeTag::ArrayClose, idx)?,
                        _ => self.parse_value(idx, Continuation::Array)?,
                    }
                }

                State::ArrayValue => {
                    let idx = self.next_index()?;
                    self.parse_value(idx, Continuation::Array)?
                }

                State::ArrayContinue => {
                    let idx = self.next_index()?;
                    match self.input[idx as usize] {
                        b',' => State::ArrayValue,
                        b']' => self.close_container(TapeTag::ArrayClose, idx)?,
                        _ => return Err(ParseError::ExpectedArraySeparator(idx as usize)),
                    }
                }

                State::DocumentEnd => match self.stream.next() {
                    None => {
                        let len = self.pj.tape.len() as u64;
                        self.pj.patch(self.root, TapeTag::Root, len);
                        return Ok(());
                    }
                    Some(idx)
                        if self.pj.line_delimited && self.input[idx as usize] == b'\n' =>
                    {
                        let len = self.pj.tape.len() as u64;
                        self.pj.patch(self.root, TapeTag::Root, len);
                        State::DocumentBegin
                    }
                    Some(idx) => return Err(ParseError::TrailingContent(idx as usize)),
                },
            };
        }
    }

    /// Advance the index stream; running out mid-structure means some
    /// container or pair never completed.
    fn next_index(&mut self) -> Result<u64, ParseError> {
        self.stream.next().ok_or(ParseError::UnclosedContainer)
    }

    /// Dispatch one value starting at `idx`.
    fn parse_value(&mut self, idx: u64, cont: Continuation) -> Result<State, ParseError> {
        let pos = idx as usize;
        match self.input[pos] {
            b'{' => {
                self.open_container(TapeTag::ObjectOpen, cont);
                Ok(State::ObjectBegin)
            }
            b'[' => {
                self.open_container(TapeTag::ArrayOpen, cont);
                Ok(State::ArrayBegin)
            }
            b'"' => {
                self.write_string(idx)?;
                Ok(continuation_state(cont))
            }
            b't' | b'f' | b'n' => {
                self.write_literal(pos)?;
                Ok(continuation_state(cont))
            }
            b'-' | b'0'..=b'9' => {
                self.write_number(pos)?;
                Ok(continuation_state(cont))
            }
            b'}' | b']' => Err(ParseError::UnexpectedClose(pos)),
            _ => Err(ParseError::ExpectedValue(pos)),
        }
    }

    /// Key, colon, value.
    fn object_field(&mut self, key_idx: u64) -> Result<State, ParseError> {
        self.write_string(key_idx)?;
        let colon = self.next_index()?;
        if self.input[colon as usize] != b':' {
            return Err(ParseError::ExpectedColon(colon as usize));
        }
        let value = self.next_index()?;
        self.parse_value(value, Continuation::Object)
    }

    fn open_container(&mut self, tag: TapeTag, cont: Continuation) {
        self.containers.push((self.pj.tape.len() as u32, cont));
        // payload is patched when the container closes
        self.pj.write(tag, 0);
    }

    fn close_container(&mut self, close_tag: TapeTag, idx: u64) -> Result<State, ParseError> {
        let (open_offset, cont) = self
            .containers
            .pop()
            .ok_or(ParseError::UnexpectedClose(idx as usize))?;
        let open_offset = open_offset as usize;
        let close_offset = self.pj.tape.len();
        let open_tag = if close_tag == TapeTag::ObjectClose {
            TapeTag::ObjectOpen
        } else {
            TapeTag::ArrayOpen
        };
        self.pj.write(close_tag, open_offset as u64);
        self.pj.patch(open_offset, open_tag, close_offset as u64);
        Ok(continuation_state(cont))
    }

    fn write_string(&mut self, idx: u64) -> Result<(), ParseError> {
        let limit = self.stream.peek().map_or(self.input.len(), |n| n as usize);
        match strings::parse_string(self.input, idx as usize, limit, &mut self.pj.strings)? {
            StringRef::InPlace { start, len } => {
                self.pj
                    .write(TapeTag::String, start as u64 | STRING_IN_PLACE_BIT);
                self.pj.write_raw(len as u64);
            }
            StringRef::Buffered { offset, len } => {
                self.pj.write(TapeTag::String, offset as u64);
                self.pj.write_raw(len as u64);
            }
        }
        Ok(())
    }

    fn write_literal(&mut self, pos: usize) -> Result<(), ParseError> {
        let rest = &self.input[pos..];
        let (text, tag): (&[u8], TapeTag) = match rest[0] {
            b't' => (b"true", TapeTag::True),
            b'f' => (b"false", TapeTag::False),
            _ => (b"null", TapeTag::Null),
        };
        if !rest.starts_with(text) {
            return Err(ParseError::InvalidLiteral(pos));
        }
        if let Some(&after) = self.input.get(pos + text.len()) {
            if !is_structural_or_whitespace(after) {
                return Err(ParseError::InvalidLiteral(pos));
            }
        }
        self.pj.write(tag, 0);
        Ok(())
    }

    fn write_number(&mut self, pos: usize) -> Result<(), ParseError> {
        match numbers::parse_number(self.input, pos)? {
            ParsedNumber::Signed(v) => {
                self.pj.write(TapeTag::Int64, 0);
                self.pj.write_raw(v as u64);
            }
            ParsedNumber::Unsigned(v) => {
                self.pj.write(TapeTag::Uint64, 0);
                self.pj.write_raw(v);
            }
            ParsedNumber::Double(v) => {
                self.pj.write(TapeTag::Float64, 0);
                self.pj.write_raw(v.to_bits());
            }
        }
        Ok(())
    }
}

/// Consume the index stream on `rx` and build the tape in `pj`.
pub(crate) fn build_tape(
    input: &[u8],
    rx: Receiver<IndexSlab>,
    pj: &mut ParsedJson,
) -> Result<(), ParseError> {
    let mut builder = TapeBuilder {
        input,
        pj,
        stream: IndexStream::new(rx),
        containers: SmallVec::new(),
        root: 0,
        roots: 0,
    };
    let verdict = builder.build();
    if verdict.is_ok() {
        log::trace!(
            "tape built: {} words, {} string bytes, {} roots",
            builder.pj.tape.len(),
            builder.pj.strings.len(),
            builder.roots
        );
    }
    verdict
}
