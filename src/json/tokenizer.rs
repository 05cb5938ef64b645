//! Resumable JSON tokenizer.
//!
//! The tokenizer never holds on to input bytes. Each call to [`Tokenizer::advance`]
//! looks at the unconsumed tail of the caller's buffer and either produces one
//! complete token or reports that the token continues past the end of the
//! buffer. Structural state (open containers, what may come next) lives in the
//! tokenizer and is only updated once a token is complete, so the caller can
//! slide, grow and refill its buffer between calls.

use serde_json::Number;

use super::error::{JsonError, JsonErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    PropertyName(String),
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Token {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Token::String(_) | Token::Number(_) | Token::Bool(_) | Token::Null
        )
    }
}

/// A token together with the nesting depth it was read at.
///
/// Depth counts the containers open around the token: members of the root
/// object are at depth 1, and a closing delimiter reports the depth of its
/// matching opening delimiter.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEvent {
    pub token: Token,
    pub depth: usize,
}

/// Outcome of one [`Tokenizer::advance`] call.
#[derive(Debug, PartialEq)]
pub enum Step {
    Token(TokenEvent),
    /// The next token extends past the end of the input.
    NeedMore,
    /// The document is complete and the input is final.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    RootValue,
    Value,
    ValueOrEnd,
    KeyOrEnd,
    Key,
    Colon,
    CommaOrEnd,
    Done,
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    stack: Vec<Container>,
    expect: Expect,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            expect: Expect::RootValue,
        }
    }

    /// Whether the root value has closed.
    pub fn is_complete(&self) -> bool {
        self.expect == Expect::Done
    }

    /// Advances over `input`, the unconsumed bytes of the caller's buffer.
    ///
    /// Returns the step and how many bytes of `input` were consumed. Whitespace,
    /// commas and colons are consumed without producing a token, so a `NeedMore`
    /// step may still consume bytes. `base_offset` is the absolute position of
    /// `input[0]` in the source and is only used for error reporting. When
    /// `is_final` is set no more input will follow and `NeedMore` is never
    /// returned.
    pub fn advance(
        &mut self,
        input: &[u8],
        is_final: bool,
        base_offset: u64,
    ) -> Result<(Step, usize), JsonError> {
        let mut pos = 0;

        loop {
            while pos < input.len() && is_whitespace(input[pos]) {
                pos += 1;
            }

            let Some(&byte) = input.get(pos) else {
                return if !is_final {
                    Ok((Step::NeedMore, pos))
                } else if self.expect == Expect::Done {
                    Ok((Step::End, pos))
                } else {
                    Err(JsonError::new(
                        JsonErrorKind::UnexpectedEnd,
                        base_offset + pos as u64,
                    ))
                };
            };
            let offset = base_offset + pos as u64;

            match self.expect {
                Expect::Done => {
                    return Err(JsonError::new(JsonErrorKind::TrailingData, offset));
                }
                Expect::Colon => {
                    if byte != b':' {
                        return Err(JsonError::unexpected(byte, offset));
                    }
                    pos += 1;
                    self.expect = Expect::Value;
                }
                Expect::CommaOrEnd => match byte {
                    b',' => {
                        pos += 1;
                        self.expect = match self.stack.last() {
                            Some(Container::Object) => Expect::Key,
                            _ => Expect::Value,
                        };
                    }
                    b'}' | b']' => return self.close(byte, pos, offset),
                    _ => return Err(JsonError::unexpected(byte, offset)),
                },
                Expect::KeyOrEnd | Expect::Key => match byte {
                    b'"' => {
                        let Some((text, len)) = scan_string(&input[pos..], is_final, offset)?
                        else {
                            return Ok((Step::NeedMore, pos));
                        };
                        self.expect = Expect::Colon;
                        let event = TokenEvent {
                            token: Token::PropertyName(text),
                            depth: self.stack.len(),
                        };
                        return Ok((Step::Token(event), pos + len));
                    }
                    b'}' if self.expect == Expect::KeyOrEnd => {
                        return self.close(byte, pos, offset)
                    }
                    _ => return Err(JsonError::unexpected(byte, offset)),
                },
                Expect::RootValue | Expect::Value | Expect::ValueOrEnd => {
                    if byte == b']' && self.expect == Expect::ValueOrEnd {
                        return self.close(byte, pos, offset);
                    }
                    return self.value(byte, &input[pos..], is_final, pos, offset);
                }
            }
        }
    }

    fn value(
        &mut self,
        byte: u8,
        rest: &[u8],
        is_final: bool,
        pos: usize,
        offset: u64,
    ) -> Result<(Step, usize), JsonError> {
        let depth = self.stack.len();
        let (token, len) = match byte {
            b'{' => {
                self.stack.push(Container::Object);
                self.expect = Expect::KeyOrEnd;
                let event = TokenEvent {
                    token: Token::StartObject,
                    depth,
                };
                return Ok((Step::Token(event), pos + 1));
            }
            b'[' => {
                self.stack.push(Container::Array);
                self.expect = Expect::ValueOrEnd;
                let event = TokenEvent {
                    token: Token::StartArray,
                    depth,
                };
                return Ok((Step::Token(event), pos + 1));
            }
            b'"' => match scan_string(rest, is_final, offset)? {
                Some((text, len)) => (Token::String(text), len),
                None => return Ok((Step::NeedMore, pos)),
            },
            b't' => match scan_literal(rest, b"true", is_final, offset)? {
                Some(len) => (Token::Bool(true), len),
                None => return Ok((Step::NeedMore, pos)),
            },
            b'f' => match scan_literal(rest, b"false", is_final, offset)? {
                Some(len) => (Token::Bool(false), len),
                None => return Ok((Step::NeedMore, pos)),
            },
            b'n' => match scan_literal(rest, b"null", is_final, offset)? {
                Some(len) => (Token::Null, len),
                None => return Ok((Step::NeedMore, pos)),
            },
            b'-' | b'0'..=b'9' => match scan_number(rest, is_final, offset)? {
                Some((number, len)) => (Token::Number(number), len),
                None => return Ok((Step::NeedMore, pos)),
            },
            _ => return Err(JsonError::unexpected(byte, offset)),
        };

        self.after_value();
        Ok((Step::Token(TokenEvent { token, depth }), pos + len))
    }

    fn close(&mut self, byte: u8, pos: usize, offset: u64) -> Result<(Step, usize), JsonError> {
        let (expected, token) = match byte {
            b'}' => (Container::Object, Token::EndObject),
            _ => (Container::Array, Token::EndArray),
        };
        if self.stack.last() != Some(&expected) {
            return Err(JsonError::unexpected(byte, offset));
        }
        self.stack.pop();
        self.after_value();
        let event = TokenEvent {
            token,
            depth: self.stack.len(),
        };
        Ok((Step::Token(event), pos + 1))
    }

    fn after_value(&mut self) {
        self.expect = if self.stack.is_empty() {
            Expect::Done
        } else {
            Expect::CommaOrEnd
        };
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Scans a string starting at its opening quote. Escapes are decoded by
/// serde_json once the closing quote is found.
fn scan_string(
    rest: &[u8],
    is_final: bool,
    offset: u64,
) -> Result<Option<(String, usize)>, JsonError> {
    let mut i = 1;
    while i < rest.len() {
        match rest[i] {
            b'\\' => i += 2,
            b'"' => {
                let raw = &rest[..=i];
                let text = serde_json::from_slice::<String>(raw).map_err(|err| {
                    JsonError::new(JsonErrorKind::InvalidString(err.to_string()), offset)
                })?;
                return Ok(Some((text, i + 1)));
            }
            _ => i += 1,
        }
    }

    if is_final {
        Err(JsonError::new(JsonErrorKind::UnexpectedEnd, offset))
    } else {
        Ok(None)
    }
}

fn scan_literal(
    rest: &[u8],
    literal: &[u8],
    is_final: bool,
    offset: u64,
) -> Result<Option<usize>, JsonError> {
    let available = rest.len().min(literal.len());
    if rest[..available] != literal[..available] {
        return Err(JsonError::new(
            JsonErrorKind::InvalidLiteral(String::from_utf8_lossy(&rest[..available]).into()),
            offset,
        ));
    }
    if available < literal.len() {
        return if is_final {
            Err(JsonError::new(JsonErrorKind::UnexpectedEnd, offset))
        } else {
            Ok(None)
        };
    }
    Ok(Some(literal.len()))
}

fn scan_number(
    rest: &[u8],
    is_final: bool,
    offset: u64,
) -> Result<Option<(Number, usize)>, JsonError> {
    let len = rest
        .iter()
        .position(|b| !matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E'))
        .unwrap_or(rest.len());

    // A number touching the end of the buffer may still have digits to come.
    if len == rest.len() && !is_final {
        return Ok(None);
    }

    let number = serde_json::from_slice::<Number>(&rest[..len]).map_err(|_| {
        JsonError::new(
            JsonErrorKind::InvalidNumber(String::from_utf8_lossy(&rest[..len]).into()),
            offset,
        )
    })?;
    Ok(Some((number, len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize_all(input: &[u8]) -> Result<Vec<TokenEvent>, JsonError> {
        let mut tokenizer = Tokenizer::new();
        let mut pos = 0;
        let mut events = Vec::new();
        loop {
            let (step, used) = tokenizer.advance(&input[pos..], true, pos as u64)?;
            pos += used;
            match step {
                Step::Token(event) => events.push(event),
                Step::End => return Ok(events),
                Step::NeedMore => unreachable!("final input never needs more"),
            }
        }
    }

    #[test]
    fn reports_depths_like_a_record_export() {
        let events =
            tokenize_all(br#"{"locations": [{"latitudeE7": 1, "x": [true, null]}]}"#).unwrap();
        let summary: Vec<(Token, usize)> =
            events.into_iter().map(|e| (e.token, e.depth)).collect();

        assert_eq!(
            summary,
            vec![
                (Token::StartObject, 0),
                (Token::PropertyName("locations".into()), 1),
                (Token::StartArray, 1),
                (Token::StartObject, 2),
                (Token::PropertyName("latitudeE7".into()), 3),
                (Token::Number(1.into()), 3),
                (Token::PropertyName("x".into()), 3),
                (Token::StartArray, 3),
                (Token::Bool(true), 4),
                (Token::Null, 4),
                (Token::EndArray, 3),
                (Token::EndObject, 2),
                (Token::EndArray, 1),
                (Token::EndObject, 0),
            ]
        );
    }

    #[test]
    fn decodes_string_escapes() {
        let events = tokenize_all(br#"["a\"b\u00e9\\"]"#).unwrap();
        assert_eq!(events[1].token, Token::String("a\"b\u{e9}\\".into()));
    }

    #[test]
    fn number_at_buffer_end_waits_for_more_input() {
        let mut tokenizer = Tokenizer::new();
        let (step, used) = tokenizer.advance(b"[12", false, 0).unwrap();
        assert!(matches!(step, Step::Token(_)));
        assert_eq!(used, 1);

        let (step, used) = tokenizer.advance(b"12", false, 1).unwrap();
        assert_eq!(step, Step::NeedMore);
        assert_eq!(used, 0);

        let (step, used) = tokenizer.advance(b"123]", false, 1).unwrap();
        assert_eq!(
            step,
            Step::Token(TokenEvent {
                token: Token::Number(123.into()),
                depth: 1,
            })
        );
        assert_eq!(used, 3);
    }

    #[test]
    fn split_string_waits_for_closing_quote() {
        let mut tokenizer = Tokenizer::new();
        tokenizer.advance(b"{", false, 0).unwrap();
        let (step, used) = tokenizer.advance(br#"  "time"#, false, 1).unwrap();
        assert_eq!(step, Step::NeedMore);
        // Leading whitespace is committed even without a token.
        assert_eq!(used, 2);
    }

    #[test]
    fn truncated_document_is_an_error() {
        let err = tokenize_all(br#"{"locations": [{"a": 1}"#).unwrap_err();
        assert!(matches!(err.kind, JsonErrorKind::UnexpectedEnd));
    }

    #[test]
    fn rejects_mismatched_delimiters() {
        let err = tokenize_all(br#"{"a": [1}"#).unwrap_err();
        assert!(matches!(err.kind, JsonErrorKind::UnexpectedByte('}')));
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn rejects_trailing_values() {
        let err = tokenize_all(b"{} {}").unwrap_err();
        assert!(matches!(err.kind, JsonErrorKind::TrailingData));
    }

    #[test]
    fn rejects_bad_literals_and_numbers() {
        assert!(matches!(
            tokenize_all(b"[tru]").unwrap_err().kind,
            JsonErrorKind::InvalidLiteral(_)
        ));
        assert!(matches!(
            tokenize_all(b"[1.2.3]").unwrap_err().kind,
            JsonErrorKind::InvalidNumber(_)
        ));
    }
}
