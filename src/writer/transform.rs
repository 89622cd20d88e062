//! Write transformer pipeline: turns a `PdfValue` graph into bytes.
//!
//! A write pass is driven by a root transformer that dispatches to one of
//! several per-kind transformers by examining the runtime variant of the
//! value being emitted. Composite children (`Dictionary`, `Array`,
//! `Stream`) are replaced by a `Reference` and queued for top-level
//! emission; scalar children are inlined.

use std::io::Write;

use crate::error::Result;
use crate::value::{ArrayNode, DictNode, PdfNumber, PdfValue, Reference, StreamNode, StringKind};
use crate::writer::context::EmissionContext;

/// Emit `value` as a complete write pass: `value` itself becomes object 1 (or
/// the next free number), and every composite it reaches is flushed as its
/// own indirect object. Returns the root's assigned reference.
///
/// Emission is depth-first-but-siblings-after: a dictionary or array's
/// composite children are displaced into references and pushed onto the work
/// stack in reverse order, so that among siblings they still pop (and get
/// emitted) in the container's own insertion order, with each sibling's own
/// displaced descendants fully drained before the next sibling is reached.
pub fn emit_document<W: Write>(ctx: &mut EmissionContext<W>, value: &PdfValue) -> Result<Reference> {
    let root_reference = get_reference(value, ctx);
    let mut queue = vec![(root_reference, value.clone())];

    while let Some((reference, value)) = queue.pop() {
        if ctx.is_duplicate(reference) {
            continue;
        }
        ctx.mark_emitted(reference);

        let offset = ctx.tell();
        ctx.record_location(reference, offset);

        ctx.write(format!("{} {} obj\n", reference.object_number, reference.generation_number).as_bytes())?;
        let mut displaced = emit_value_body(ctx, &value)?;
        ctx.write(b"\nendobj\n")?;

        displaced.reverse();
        queue.extend(displaced);
    }

    Ok(root_reference)
}

/// Return the reference identifying `value`'s indirect slot, allocating and
/// attaching a fresh one if it doesn't already carry one.
fn get_reference<W: Write>(value: &PdfValue, ctx: &mut EmissionContext<W>) -> Reference {
    if let Some(existing) = value.back_reference() {
        return existing;
    }
    let reference = Reference::new(ctx.allocate_object_number(), 0);
    value.set_back_reference(reference);
    reference
}

/// Emit the body of an indirect object (the part between `N G obj` and
/// `endobj`), returning the composite children displaced into references
/// that must themselves be emitted.
pub(crate) fn emit_value_body<W: Write>(ctx: &mut EmissionContext<W>, value: &PdfValue) -> Result<Vec<(Reference, PdfValue)>> {
    match value {
        PdfValue::Dictionary(dict) => emit_dictionary(ctx, dict),
        PdfValue::Array(arr) => emit_array(ctx, arr),
        PdfValue::Stream(stream) => emit_stream(ctx, stream),
        other => {
            emit_inline(ctx, other, &mut Vec::new())?;
            Ok(Vec::new())
        },
    }
}

/// Write a value's inline textual form, displacing any composite child into
/// `queue` rather than recursing into it.
fn emit_inline<W: Write>(ctx: &mut EmissionContext<W>, value: &PdfValue, queue: &mut Vec<(Reference, PdfValue)>) -> Result<()> {
    match value {
        PdfValue::Null => ctx.write(b"null"),
        PdfValue::Boolean(b) => ctx.write(if *b { b"true" } else { b"false" }),
        PdfValue::Number(n) => write_number(ctx, n),
        PdfValue::Name(n) => write_name(ctx, n),
        PdfValue::String(bytes, kind) => write_string(ctx, bytes, *kind),
        PdfValue::Indirect(r) => ctx.write(format!("{} {} R", r.object_number, r.generation_number).as_bytes()),
        PdfValue::Array(_) | PdfValue::Dictionary(_) | PdfValue::Stream(_) => {
            let reference = get_reference(value, ctx);
            queue.push((reference, value.clone()));
            ctx.write(format!("{} {} R", reference.object_number, reference.generation_number).as_bytes())
        },
    }
}

fn write_number<W: Write>(ctx: &mut EmissionContext<W>, n: &PdfNumber) -> Result<()> {
    ctx.write(n.to_pdf_string().as_bytes())
}

fn write_name<W: Write>(ctx: &mut EmissionContext<W>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::with_capacity(name.len() + 1);
    buf.push(b'/');
    for &byte in name {
        match byte {
            b'!' | b'"' | b'$'..=b'\'' | b'*'..=b'.' | b'0'..=b'9' | b';' | b'<' | b'>' | b'?' | b'@' | b'A'..=b'Z' | b'^'..=b'z' | b'|' | b'~' => {
                buf.push(byte);
            },
            _ => {
                buf.extend_from_slice(format!("#{:02X}", byte).as_bytes());
            },
        }
    }
    ctx.write(&buf)
}

/// Write a string, escaping unbalanced parens/backslash/CR for a literal
/// string or rendering two-digit hex for a hex string.
fn write_string<W: Write>(ctx: &mut EmissionContext<W>, data: &[u8], kind: StringKind) -> Result<()> {
    match kind {
        StringKind::Hex => {
            let mut buf = Vec::with_capacity(data.len() * 2 + 2);
            buf.push(b'<');
            for &byte in data {
                buf.extend_from_slice(format!("{:02X}", byte).as_bytes());
            }
            buf.push(b'>');
            ctx.write(&buf)
        },
        StringKind::Literal => {
            let mut escape_indices = Vec::new();
            let mut unmatched_opens = Vec::new();
            for (index, &byte) in data.iter().enumerate() {
                match byte {
                    b'(' => unmatched_opens.push(index),
                    b')' => {
                        if unmatched_opens.pop().is_none() {
                            escape_indices.push(index);
                        }
                    },
                    b'\\' | b'\r' => escape_indices.push(index),
                    _ => {},
                }
            }
            escape_indices.extend(unmatched_opens);

            let mut buf = Vec::with_capacity(data.len() + 2);
            buf.push(b'(');
            for (index, &byte) in data.iter().enumerate() {
                if escape_indices.contains(&index) {
                    buf.push(b'\\');
                    buf.push(if byte == b'\r' { b'r' } else { byte });
                } else {
                    buf.push(byte);
                }
            }
            buf.push(b')');
            ctx.write(&buf)
        },
    }
}

fn emit_array<W: Write>(ctx: &mut EmissionContext<W>, arr: &ArrayNode) -> Result<Vec<(Reference, PdfValue)>> {
    let mut queue = Vec::new();
    ctx.write(b"[")?;
    for (i, element) in arr.elements().iter().enumerate() {
        if i > 0 {
            ctx.write(b" ")?;
        }
        emit_inline(ctx, element, &mut queue)?;
    }
    ctx.write(b"]")?;
    Ok(queue)
}

fn emit_dictionary<W: Write>(ctx: &mut EmissionContext<W>, dict: &DictNode) -> Result<Vec<(Reference, PdfValue)>> {
    let mut queue = Vec::new();
    write_dictionary_body(ctx, dict, &mut queue)?;
    Ok(queue)
}

pub(crate) fn write_dictionary_body<W: Write>(ctx: &mut EmissionContext<W>, dict: &DictNode, queue: &mut Vec<(Reference, PdfValue)>) -> Result<()> {
    ctx.write(b"<<")?;
    for (key, value) in dict.entries() {
        ctx.write(b" ")?;
        write_name(ctx, &key)?;
        ctx.write(b" ")?;
        emit_inline(ctx, &value, queue)?;
    }
    ctx.write(b" >>")
}

fn emit_stream<W: Write>(ctx: &mut EmissionContext<W>, stream: &StreamNode) -> Result<Vec<(Reference, PdfValue)>> {
    let raw = stream.raw_bytes();
    let mut queue = Vec::new();

    // /Length is rewritten to the exact raw byte count; the dictionary's own
    // stored value, if any, is never trusted for the emitted file.
    let dict = DictNode::new();
    for (key, value) in stream.dict.entries() {
        if key != b"Length" {
            dict.insert(key, value);
        }
    }
    dict.insert(b"Length".to_vec(), PdfValue::Number(PdfNumber::integer(raw.len() as i64)));

    write_dictionary_body(ctx, &dict, &mut queue)?;
    ctx.write(b"\nstream\n")?;
    ctx.write(&raw)?;
    ctx.write(b"\nendstream")?;

    Ok(queue)
}
