use thiserror::Error;

/// Errors produced by either parsing stage.
///
/// Every error is fatal for the parse: no partial tape is published, and the
/// string buffer may hold partial data that nothing references. Variants
/// carry the byte offset of the offending input where the scanner knows it;
/// mask-level failures detected at end of input do not have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty or all-whitespace document")]
    EmptyDocument,

    #[error("invalid UTF-8 in document")]
    InvalidUtf8,

    #[error("unescaped control character inside string")]
    ControlCharacterInString,

    #[error("unterminated string at end of input")]
    UnterminatedString,

    #[error("document does not end with the bracket that matches its opening bracket")]
    MismatchedOuterBracket,

    #[error("invalid escape sequence at byte {0}")]
    InvalidEscape(usize),

    #[error("incomplete unicode escape at byte {0}")]
    IncompleteUnicodeEscape(usize),

    #[error("lone surrogate in string at byte {0}")]
    LoneSurrogate(usize),

    #[error("invalid number at byte {0}")]
    InvalidNumber(usize),

    #[error("invalid literal at byte {0}")]
    InvalidLiteral(usize),

    #[error("expected a value at byte {0}")]
    ExpectedValue(usize),

    #[error("expected a string key at byte {0}")]
    ExpectedKey(usize),

    #[error("expected ':' at byte {0}")]
    ExpectedColon(usize),

    #[error("expected ',' or '}}' at byte {0}")]
    ExpectedObjectSeparator(usize),

    #[error("expected ',' or ']' at byte {0}")]
    ExpectedArraySeparator(usize),

    #[error("unexpected closing bracket at byte {0}")]
    UnexpectedClose(usize),

    #[error("trailing content after top-level value at byte {0}")]
    TrailingContent(usize),

    #[error("unclosed container at end of input")]
    UnclosedContainer,
}
