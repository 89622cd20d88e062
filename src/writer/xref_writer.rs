//! Cross-reference and trailer emission: the last stage of a write pass.
//!
//! After every reachable object has been flushed by
//! [`crate::writer::transform::emit_document`], this module writes either a
//! classic tabular `xref` section or a PDF 1.5+ cross-reference stream,
//! followed by the trailer and a terminal `startxref`/`%%EOF`.

use std::io::Write;

use crate::error::Result;
use crate::parser_config::WriterOptions;
use crate::value::{ArrayNode, DictNode, PdfNumber, PdfValue, Reference};
use crate::writer::context::EmissionContext;
use crate::writer::transform::emit_document;

/// Write the complete xref section, trailer, and `startxref` trailer for a
/// document whose root is `root` and whose objects have already been
/// emitted by [`emit_document`].
///
/// `extra_trailer_entries` lets a caller add fields like `/Info` or `/Prev`
/// beyond the mandatory `/Size` and `/Root`.
pub fn write_xref_and_trailer<W: Write>(
    ctx: &mut EmissionContext<W>,
    root: Reference,
    extra_trailer_entries: &[(Vec<u8>, PdfValue)],
    options: &WriterOptions,
) -> Result<()> {
    let xref_offset = ctx.tell();

    if options.use_xref_stream {
        write_xref_stream(ctx, root, extra_trailer_entries)?;
    } else {
        let size = ctx.next_unused_object_number();
        write_tabular_xref(ctx, root, size, extra_trailer_entries)?;
    }

    ctx.write(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes())
}

/// Emit a document's object graph followed by its xref and trailer, the
/// complete write pass in one call.
pub fn write_document<W: Write>(destination: W, value: &PdfValue, options: &WriterOptions) -> Result<W> {
    let mut ctx = EmissionContext::new(destination, options.first_allocated_object_number);
    let root = emit_document(&mut ctx, value)?;
    write_xref_and_trailer(&mut ctx, root, &[], options)?;
    Ok(ctx.finish())
}

fn write_tabular_xref<W: Write>(ctx: &mut EmissionContext<W>, root: Reference, size: u32, extra_trailer_entries: &[(Vec<u8>, PdfValue)]) -> Result<()> {
    let locations_by_object = offsets_by_object_number(ctx);

    ctx.write(b"xref\n")?;
    ctx.write(format!("0 {}\n", size).as_bytes())?;
    ctx.write(b"0000000000 65535 f \n")?;

    for obj_num in 1..size {
        if let Some(&offset) = locations_by_object.get(&obj_num) {
            ctx.write(format!("{:010} {:05} n \n", offset, 0).as_bytes())?;
        } else {
            ctx.write(b"0000000000 00000 f \n")?;
        }
    }

    write_trailer(ctx, root, size, extra_trailer_entries)
}

/// Project the emission context's `Reference -> offset` map down to
/// `object_number -> offset`, for O(1) lookups while building the xref.
fn offsets_by_object_number<W: Write>(ctx: &EmissionContext<W>) -> std::collections::HashMap<u32, u64> {
    ctx.object_locations().iter().map(|(r, &offset)| (r.object_number, offset)).collect()
}

fn write_trailer<W: Write>(ctx: &mut EmissionContext<W>, root: Reference, size: u32, extra_trailer_entries: &[(Vec<u8>, PdfValue)]) -> Result<()> {
    let trailer = DictNode::new();
    trailer.insert(b"Size".to_vec(), PdfValue::Number(PdfNumber::integer(size as i64)));
    trailer.insert(b"Root".to_vec(), PdfValue::Indirect(root));
    for (key, value) in extra_trailer_entries {
        trailer.insert(key.clone(), value.clone());
    }

    ctx.write(b"trailer\n")?;
    crate::writer::transform::write_dictionary_body(ctx, &trailer, &mut Vec::new())?;
    ctx.write(b"\n")
}

/// Emit a PDF 1.5+ `/Type /XRef` stream carrying the same location data a
/// tabular section would, as its own trailing indirect object. The xref
/// stream's own object number is allocated before `/Size` is computed, and
/// its location is recorded before the entry table is built, so the stream
/// describes its own offset like every other in-use object.
fn write_xref_stream<W: Write>(ctx: &mut EmissionContext<W>, root: Reference, extra_trailer_entries: &[(Vec<u8>, PdfValue)]) -> Result<()> {
    let xref_obj_num = ctx.allocate_object_number();
    let xref_offset = ctx.tell();
    ctx.record_location(Reference::new(xref_obj_num, 0), xref_offset);

    let size = ctx.next_unused_object_number();
    let locations_by_object = offsets_by_object_number(ctx);

    let mut body = Vec::with_capacity(size as usize * 5);
    // Object 0: free-list head.
    body.extend_from_slice(&[0u8, 0, 0, 0, 0, 0xFF, 0xFF]);

    for obj_num in 1..size {
        if let Some(&offset) = locations_by_object.get(&obj_num) {
            body.push(1);
            body.extend_from_slice(&(offset as u32).to_be_bytes());
            body.extend_from_slice(&0u16.to_be_bytes());
        } else {
            body.push(0);
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(&0xFFFFu16.to_be_bytes());
        }
    }

    let dict = DictNode::new();
    dict.insert(b"Type".to_vec(), PdfValue::Name(b"XRef".to_vec()));
    dict.insert(b"Size".to_vec(), PdfValue::Number(PdfNumber::integer(size as i64)));
    dict.insert(b"W".to_vec(), PdfValue::Array(ArrayNode::from_vec(vec![
        PdfValue::Number(PdfNumber::integer(1)),
        PdfValue::Number(PdfNumber::integer(4)),
        PdfValue::Number(PdfNumber::integer(2)),
    ])));
    dict.insert(b"Root".to_vec(), PdfValue::Indirect(root));
    for (key, value) in extra_trailer_entries {
        dict.insert(key.clone(), value.clone());
    }

    let stream = crate::value::StreamNode::new(dict, bytes::Bytes::from(body));
    let value = PdfValue::Stream(stream);
    value.set_back_reference(Reference::new(xref_obj_num, 0));

    ctx.write(format!("{} 0 obj\n", xref_obj_num).as_bytes())?;
    crate::writer::transform::emit_value_body(ctx, &value)?;
    ctx.write(b"\nendobj\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabular_write_round_trips_through_the_reader() {
        let catalog = DictNode::new();
        catalog.insert(b"Type".to_vec(), PdfValue::Name(b"Catalog".to_vec()));

        let output = write_document(Vec::new(), &PdfValue::Dictionary(catalog), &WriterOptions::tabular()).unwrap();
        let text = String::from_utf8(output).unwrap();

        assert!(text.contains("1 0 obj"));
        assert!(text.contains("xref"));
        assert!(text.contains("trailer"));
        assert!(text.contains("/Root 1 0 R"));
        assert!(text.contains("startxref"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn xref_stream_write_emits_type_xref_object() {
        let catalog = DictNode::new();
        catalog.insert(b"Type".to_vec(), PdfValue::Name(b"Catalog".to_vec()));

        let output = write_document(Vec::new(), &PdfValue::Dictionary(catalog), &WriterOptions::compact()).unwrap();
        let text = String::from_utf8_lossy(&output);

        assert!(text.contains("/Type /XRef"));
        assert!(text.contains("startxref"));
    }

    #[test]
    fn trailer_carries_correct_size() {
        let a = DictNode::new();
        let b = DictNode::new();
        a.insert(b"Kid".to_vec(), PdfValue::Dictionary(b));

        let output = write_document(Vec::new(), &PdfValue::Dictionary(a), &WriterOptions::tabular()).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("/Size 3"));
    }

    #[test]
    fn xref_stream_size_accounts_for_its_own_object() {
        let a = DictNode::new();
        let b = DictNode::new();
        a.insert(b"Kid".to_vec(), PdfValue::Dictionary(b));

        let output = write_document(Vec::new(), &PdfValue::Dictionary(a), &WriterOptions::compact()).unwrap();
        let text = String::from_utf8_lossy(&output);

        // Two emitted dictionaries (objects 1 and 2) plus the xref stream
        // itself (object 3): /Size must be 4, one past the highest object.
        assert!(text.contains("/Size 4"));
        assert!(text.contains("3 0 obj"));
    }

    #[test]
    fn xref_stream_entry_table_describes_its_own_offset() {
        let catalog = DictNode::new();
        catalog.insert(b"Type".to_vec(), PdfValue::Name(b"Catalog".to_vec()));

        let output = write_document(Vec::new(), &PdfValue::Dictionary(catalog), &WriterOptions::compact()).unwrap();

        // Object 1 is the catalog, object 2 is the xref stream: /W [1 4 2]
        // means each entry is 7 bytes, so the entry table is 3 entries (for
        // object numbers 0, 1, 2) long once it includes the stream's own.
        let stream_marker = b"stream\n";
        let start = output.windows(stream_marker.len()).position(|w| w == stream_marker).unwrap() + stream_marker.len();
        let entries = &output[start..start + 21];
        assert_eq!(entries.len(), 21);
        // Entry for object 2 (the xref stream) is in-use (type byte 1).
        assert_eq!(entries[14], 1);
    }
}
