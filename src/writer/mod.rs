//! Write transformer pipeline: turns an in-memory [`crate::value::PdfValue`]
//! object graph into PDF bytes.
//!
//! ## Architecture
//!
//! ```text
//! PdfValue (object graph, possibly cyclic, shared via Rc)
//!     ↓
//! [EmissionContext] (per-pass sink, object-number allocator, location map)
//!     ↓
//! [transform::emit_document] (indirection rule, duplicate suppression, /Length rewriting)
//!     ↓
//! [xref_writer] (tabular xref or xref stream, trailer, startxref)
//!     ↓
//! PDF bytes
//! ```

pub mod context;
pub mod transform;
pub mod xref_writer;

pub use context::EmissionContext;
pub use transform::emit_document;
pub use xref_writer::{write_document, write_xref_and_trailer};
