//! The tokenizer contract the cross-reference engine and object resolver
//! depend on, plus a concrete in-memory implementation over an owned byte
//! buffer.
//!
//! The byte-level grammar itself lives in [`crate::lexer`]; this module only
//! fixes the operations callers are allowed to depend on, so that the xref
//! engine and resolver never reach past the contract into lexer internals.

use crate::error::{Error, Result};
use crate::lexer;
use crate::value::PdfValue;

/// One atomic token: a keyword, number, name, string, or delimiter.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An integer-valued number.
    Integer(i64),
    /// A real number in its exact textual form.
    Real(String),
    /// The raw (still-escaped) bytes of a literal string's content.
    LiteralString(Vec<u8>),
    /// The raw hex digits of a hex string's content.
    HexString(Vec<u8>),
    /// A decoded `/Name`.
    Name(String),
    /// `true`.
    True,
    /// `false`.
    False,
    /// `null`.
    Null,
    /// `[`.
    ArrayStart,
    /// `]`.
    ArrayEnd,
    /// `<<`.
    DictStart,
    /// `>>`.
    DictEnd,
    /// `obj`.
    ObjStart,
    /// `endobj`.
    ObjEnd,
    /// `stream`.
    StreamStart,
    /// `endstream`.
    StreamEnd,
    /// `R`.
    Reference,
}

impl<'a> From<lexer::Token<'a>> for Token {
    fn from(t: lexer::Token<'a>) -> Self {
        match t {
            lexer::Token::Integer(n) => Token::Integer(n),
            lexer::Token::Real(raw) => Token::Real(String::from_utf8_lossy(raw).into_owned()),
            lexer::Token::LiteralString(bytes) => Token::LiteralString(bytes.to_vec()),
            lexer::Token::HexString(bytes) => Token::HexString(bytes.to_vec()),
            lexer::Token::Name(name) => Token::Name(name),
            lexer::Token::True => Token::True,
            lexer::Token::False => Token::False,
            lexer::Token::Null => Token::Null,
            lexer::Token::ArrayStart => Token::ArrayStart,
            lexer::Token::ArrayEnd => Token::ArrayEnd,
            lexer::Token::DictStart => Token::DictStart,
            lexer::Token::DictEnd => Token::DictEnd,
            lexer::Token::ObjStart => Token::ObjStart,
            lexer::Token::ObjEnd => Token::ObjEnd,
            lexer::Token::StreamStart => Token::StreamStart,
            lexer::Token::StreamEnd => Token::StreamEnd,
            lexer::Token::R => Token::Reference,
        }
    }
}

/// The byte-to-token/byte-to-object contract the cross-reference engine and
/// object resolver are written against.
pub trait Tokenizer {
    /// Reposition the underlying source at `offset`.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// The current position in the underlying source.
    fn tell(&self) -> u64;

    /// The total length of the underlying source.
    fn len(&self) -> u64;

    /// Parse one atomic token at the current position, advancing past it.
    fn read_token(&mut self) -> Result<Token>;

    /// Parse one complete PDF object (scalar, composite, or stream) at the
    /// current position, advancing past it.
    fn read_object(&mut self) -> Result<PdfValue>;

    /// Advance past any whitespace and comments at the current position.
    fn skip_whitespace(&mut self);
}

/// A [`Tokenizer`] over an in-memory byte buffer, used for both freshly
/// loaded files and for decoded object-stream payloads.
pub struct SliceTokenizer {
    buffer: Vec<u8>,
    position: usize,
}

impl SliceTokenizer {
    /// Wrap an owned byte buffer for tokenizing, starting at offset 0.
    pub fn new(buffer: Vec<u8>) -> Self {
        SliceTokenizer { buffer, position: 0 }
    }

    /// The bytes from the current position to the end of the buffer.
    pub fn remaining(&self) -> &[u8] {
        &self.buffer[self.position.min(self.buffer.len())..]
    }
}

impl Tokenizer for SliceTokenizer {
    fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.buffer.len() as u64 {
            return Err(Error::UnexpectedEof);
        }
        self.position = offset as usize;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position as u64
    }

    fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn read_token(&mut self) -> Result<Token> {
        let input = self.remaining();
        if input.is_empty() {
            return Err(Error::UnexpectedEof);
        }
        match lexer::token(input) {
            Ok((rest, tok)) => {
                let consumed = input.len() - rest.len();
                let tok = tok.into();
                self.position += consumed;
                Ok(tok)
            },
            Err(_) => Err(Error::LexError {
                offset: self.position,
                reason: "no valid token at this position".to_string(),
            }),
        }
    }

    fn read_object(&mut self) -> Result<PdfValue> {
        let input = self.remaining();
        let (rest, value) = crate::parser::parse_value(input).map_err(|_| Error::LexError {
            offset: self.position,
            reason: "failed to parse object".to_string(),
        })?;
        let consumed = input.len() - rest.len();
        self.position += consumed;
        Ok(value)
    }

    fn skip_whitespace(&mut self) {
        let input = self.remaining();
        let skipped = input
            .iter()
            .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C))
            .count();
        self.position += skipped;
    }
}
