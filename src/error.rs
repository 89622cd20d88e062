//! Error types for the PDF object graph serialization layer.
//!
//! This module defines every failure kind the tokenizer, cross-reference
//! engine, object resolver, and write transformer pipeline can surface.

/// Result type alias for PDF graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading or writing a PDF object graph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A byte sequence does not form a valid token.
    #[error("failed to lex token at byte {offset}: {reason}")]
    LexError {
        /// Byte offset where the lexer gave up.
        offset: usize,
        /// Human-readable description of what was expected.
        reason: String,
    },

    /// The source ended before a token or object could be completed.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Neither `startxref`, a forward scan, nor reconstruction located a usable xref.
    #[error("no cross-reference table could be located")]
    XrefMissing,

    /// An xref section was found but its structure violates the format (bad
    /// widths, bad subsection count, truncated entries, non-numeric fields).
    #[error("malformed cross-reference table: {0}")]
    XrefMalformed(String),

    /// A `/Prev` chain revisited an offset already seen during the walk.
    #[error("cross-reference /Prev chain loops back to offset {0}")]
    XrefLoop(u64),

    /// A `Reference` points at an object number with no xref entry, or whose
    /// entry cannot actually be loaded.
    #[error("unresolved reference: {0} {1} R")]
    UnresolvedReference(u32, u16),

    /// A compressed object stream's header (`/N`, `/First`, or its
    /// object-number/offset pairs) is inconsistent.
    #[error("malformed object stream: {0}")]
    ObjectStreamMalformed(String),

    /// A stream's declared filter chain failed to decode its raw bytes.
    #[error("stream decode failed (filter {filter}, position {position}): {reason}")]
    StreamDecodeError {
        /// Name of the filter stage that failed.
        filter: String,
        /// Byte position within the stream's raw data at the point of failure.
        position: usize,
        /// Description of the failure.
        reason: String,
    },

    /// `/Filter` named a filter absent from the registry.
    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    /// A value was the wrong `PdfValue` variant for the operation attempted.
    #[error("type mismatch: expected {expected}, found {received}")]
    TypeMismatch {
        /// The variant name that was required.
        expected: String,
        /// The variant name actually encountered.
        received: String,
    },

    /// A numeric field was outside the range the format allows (e.g. a
    /// generation number above 65535, a negative object count).
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    /// Underlying I/O failure on the byte source or sink.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A string that was assumed to be UTF-8 (names, keywords) was not.
    #[error("UTF-8 decoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

impl Error {
    /// Build a [`Error::TypeMismatch`] from variant names.
    pub fn type_mismatch(expected: impl Into<String>, received: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            received: received.into(),
        }
    }
}
