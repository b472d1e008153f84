// ============================================================================
// Number parsing (stage 2)
// ============================================================================

use crate::error::ParseError;
use crate::simd_utils::is_structural_or_whitespace;

/// A parsed numeric literal, classified by the narrowest tape representation
/// that holds it exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedNumber {
    /// Integer in the signed 64-bit range.
    Signed(i64),
    /// Non-negative integer above `i64::MAX` but within unsigned 64 bits.
    Unsigned(u64),
    /// Everything else: fractions, exponents, and integers beyond 64 bits.
    Double(f64),
}

/// Parse the numeric literal starting at `start` (a digit or `-`).
///
/// Follows RFC 8259: optional minus, integer part with no superfluous
/// leading zero, optional fraction, optional exponent. The byte after the
/// literal must be structural, whitespace, or end of input. Exponents whose
/// value leaves the finite f64 range are rejected.
pub fn parse_number(input: &[u8], start: usize) -> Result<ParsedNumber, ParseError> {
    let len = input.len();
    let mut pos = start;
    let mut is_float = false;

    let negative = input[pos] == b'-';
    if negative {
        pos += 1;
    }

    let digit_start = pos;
    match input.get(pos) {
        Some(b'0') => pos += 1,
        Some(b'1'..=b'9') => {
            while pos < len && input[pos].is_ascii_digit() {
                pos += 1;
            }
        }
        _ => return Err(ParseError::InvalidNumber(start)),
    }
    let int_digits = pos - digit_start;

    if pos < len && input[pos] == b'.' {
        is_float = true;
        pos += 1;
        if pos >= len || !input[pos].is_ascii_digit() {
            return Err(ParseError::InvalidNumber(start));
        }
        while pos < len && input[pos].is_ascii_digit() {
            pos += 1;
        }
    }

    if pos < len && (input[pos] == b'e' || input[pos] == b'E') {
        is_float = true;
        pos += 1;
        if pos < len && (input[pos] == b'+' || input[pos] == b'-') {
            pos += 1;
        }
        if pos >= len || !input[pos].is_ascii_digit() {
            return Err(ParseError::InvalidNumber(start));
        }
        while pos < len && input[pos].is_ascii_digit() {
            pos += 1;
        }
    }

    // Leading zero with more digits ("01") never reaches here as a longer
    // literal; the scan stops after the zero, so the stray digit trips
    // this terminator check instead.
    if let Some(&after) = input.get(pos) {
        if !is_structural_or_whitespace(after) {
            return Err(ParseError::InvalidNumber(start));
        }
    }

    let text = &input[start..pos];

    if is_float {
        return parse_double(text, start);
    }

    // Inline accumulation for up to 18 digits: the largest 18-digit value is
    // below i64::MAX and its negation is above i64::MIN, so no overflow
    // check is needed.
    if int_digits <= 18 {
        let mut value: i64 = 0;
        for &b in &input[digit_start..pos] {
            value = value * 10 + (b - b'0') as i64;
        }
        if negative {
            value = -value;
        }
        return Ok(ParsedNumber::Signed(value));
    }

    if let Ok(i) = lexical_core::parse::<i64>(text) {
        return Ok(ParsedNumber::Signed(i));
    }
    if !negative {
        if let Ok(u) = lexical_core::parse::<u64>(text) {
            return Ok(ParsedNumber::Unsigned(u));
        }
    }
    parse_double(text, start)
}

fn parse_double(text: &[u8], start: usize) -> Result<ParsedNumber, ParseError> {
    let value: f64 =
        lexical_core::parse(text).map_err(|_| ParseError::InvalidNumber(start))?;
    if !value.is_finite() {
        return Err(ParseError::InvalidNumber(start));
    }
    Ok(ParsedNumber::Double(value))
}
