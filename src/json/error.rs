use std::fmt;

use thiserror::Error;

#[derive(Debug)]
pub enum JsonErrorKind {
    UnexpectedByte(char),
    UnexpectedEnd,
    TrailingData,
    InvalidString(String),
    InvalidLiteral(String),
    InvalidNumber(String),
    Io(std::io::Error),
}

impl fmt::Display for JsonErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonErrorKind::UnexpectedByte(c) => write!(f, "unexpected character {c:?}"),
            JsonErrorKind::UnexpectedEnd => write!(f, "unexpected end of input"),
            JsonErrorKind::TrailingData => write!(f, "trailing data after document"),
            JsonErrorKind::InvalidString(err) => write!(f, "invalid string: {err}"),
            JsonErrorKind::InvalidLiteral(raw) => write!(f, "invalid literal '{raw}'"),
            JsonErrorKind::InvalidNumber(raw) => write!(f, "invalid number '{raw}'"),
            JsonErrorKind::Io(err) => write!(f, "read failed: {err}"),
        }
    }
}

/// Fatal tokenizer failure at an absolute byte offset of the source.
#[derive(Debug, Error)]
#[error("malformed JSON at byte {offset}: {kind}")]
pub struct JsonError {
    pub kind: JsonErrorKind,
    pub offset: u64,
}

impl JsonError {
    pub fn new(kind: JsonErrorKind, offset: u64) -> Self {
        Self { kind, offset }
    }

    pub(crate) fn unexpected(byte: u8, offset: u64) -> Self {
        Self::new(JsonErrorKind::UnexpectedByte(char::from(byte)), offset)
    }
}
