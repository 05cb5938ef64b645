use std::io::{ErrorKind, Read};

use super::error::{JsonError, JsonErrorKind};
use super::tokenizer::{Step, TokenEvent, Tokenizer};

const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Pulls tokens out of a byte source through a growable buffer.
///
/// Only the bytes of the token currently being read have to fit in the
/// buffer. When a token runs past the end of what has been read, consumed
/// bytes are discarded, the remainder slides to the front, and the buffer
/// doubles if the remainder already fills it.
pub struct TokenReader<R> {
    source: R,
    buffer: Vec<u8>,
    filled: usize,
    consumed: usize,
    /// Total bytes pulled from `source`.
    bytes_read: u64,
    exhausted: bool,
    tokenizer: Tokenizer,
}

impl<R: Read> TokenReader<R> {
    pub fn with_capacity(source: R, capacity: usize) -> Self {
        Self {
            source,
            buffer: vec![0; capacity.max(1)],
            filled: 0,
            consumed: 0,
            bytes_read: 0,
            exhausted: false,
            tokenizer: Tokenizer::new(),
        }
    }

    /// Returns the next token, or `None` once the root value has closed.
    /// Bytes after the root value are never examined.
    pub fn next_token(&mut self) -> Result<Option<TokenEvent>, JsonError> {
        if self.tokenizer.is_complete() {
            return Ok(None);
        }
        loop {
            let base_offset = self.bytes_read - (self.filled - self.consumed) as u64;
            let (step, used) = self.tokenizer.advance(
                &self.buffer[self.consumed..self.filled],
                self.exhausted,
                base_offset,
            )?;
            self.consumed += used;

            match step {
                Step::Token(event) => return Ok(Some(event)),
                Step::End => return Ok(None),
                Step::NeedMore => self.refill()?,
            }
        }
    }

    /// Bytes pulled from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn refill(&mut self) -> Result<(), JsonError> {
        let leftover = self.filled - self.consumed;
        if leftover == self.buffer.len() {
            let grown = self.buffer.len() * 2;
            log_debug!("token exceeds {} byte buffer; growing to {}", self.buffer.len(), grown);
            self.buffer.resize(grown, 0);
        }

        self.buffer.copy_within(self.consumed..self.filled, 0);
        self.consumed = 0;
        self.filled = leftover;

        let read = loop {
            match self.source.read(&mut self.buffer[self.filled..]) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(JsonError::new(JsonErrorKind::Io(err), self.bytes_read)),
            }
        };

        if read == 0 {
            self.exhausted = true;
        }
        self.filled += read;
        self.bytes_read += read as u64;
        Ok(())
    }
}
