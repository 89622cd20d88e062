//! Integration-level round-trip scenarios exercising the full read and
//! write paths together: xref location, object resolution, and the write
//! transformer pipeline, rather than any single module in isolation.

use pdf_graph::decoders::default_registry;
use pdf_graph::document::{write_document, PdfDocument};
use pdf_graph::parser_config::WriterOptions;
use pdf_graph::value::{DictNode, PdfNumber, PdfValue, Reference, StreamNode};
use pdf_graph::xref::{CrossRefTable, XRefEntry};

fn write_at(data: &mut Vec<u8>, bytes: &[u8]) -> u64 {
    let offset = data.len() as u64;
    data.extend_from_slice(bytes);
    offset
}

/// Scenario 1: a 3-object PDF (Catalog, Pages, Page) with a classic xref.
/// The resolver must return a Catalog whose `/Pages` resolves to a Pages
/// dictionary with `/Count = 1`.
#[test]
fn minimal_document_resolves_catalog_through_pages() {
    let mut data = Vec::new();
    write_at(&mut data, b"%PDF-1.4\n");
    let obj1 = write_at(&mut data, b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    let obj2 = write_at(&mut data, b"2 0 obj\n<< /Type /Pages /Count 1 /Kids [3 0 R] >>\nendobj\n");
    let obj3 = write_at(&mut data, b"3 0 obj\n<< /Type /Page /Parent 2 0 R >>\nendobj\n");
    let xref_offset = write_at(&mut data, b"xref\n0 4\n");
    data.extend_from_slice(b"0000000000 65535 f \n");
    data.extend_from_slice(format!("{:010} {:05} n \n", obj1, 0).as_bytes());
    data.extend_from_slice(format!("{:010} {:05} n \n", obj2, 0).as_bytes());
    data.extend_from_slice(format!("{:010} {:05} n \n", obj3, 0).as_bytes());
    data.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\n");
    data.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minimal.pdf");
    std::fs::write(&path, &data).unwrap();

    let doc = PdfDocument::open(&path).unwrap();
    let catalog = doc.catalog().unwrap();
    assert_eq!(catalog.get(b"Type").unwrap().as_name(), Some(&b"Catalog"[..]));

    let pages_ref = catalog.get(b"Pages").unwrap().as_reference().unwrap();
    let pages = doc.resolve(pages_ref).unwrap();
    let pages_dict = pages.as_dict().unwrap();
    assert_eq!(pages_dict.get(b"Type").unwrap().as_name(), Some(&b"Pages"[..]));
    assert_eq!(pages_dict.get(b"Count").unwrap().as_i64(), Some(1));
}

/// Scenario 2: a hybrid file whose classic xref carries `/XRefStm`, pointing
/// to a cross-reference stream that describes one object packed inside an
/// `/ObjStm`. Resolving that object must return the correct dictionary, and
/// its xref entry's `stream_object_number` must name the containing stream.
#[test]
fn compressed_object_resolves_via_hybrid_xrefstm() {
    let mut data = Vec::new();
    write_at(&mut data, b"%PDF-1.5\n");

    let obj1 = write_at(&mut data, b"1 0 obj\n<< /Type /Catalog /Extra 10 0 R >>\nendobj\n");

    // Object stream (object 2) packing a single compressed object, number 10.
    let pairs = b"10 0";
    let body = b"<< /Type /Page >>";
    let mut stream_body = Vec::new();
    stream_body.extend_from_slice(pairs);
    stream_body.push(b' ');
    stream_body.extend_from_slice(body);
    let obj2 = write_at(
        &mut data,
        format!("2 0 obj\n<< /Type /ObjStm /N 1 /First {} >>\nstream\n", pairs.len() + 1).as_bytes(),
    );
    data.extend_from_slice(&stream_body);
    data.extend_from_slice(b"\nendstream\nendobj\n");

    // Hybrid cross-reference stream (object 3): one entry, object 10,
    // compressed inside object 2 at index 0. W = [1 2 1].
    let mut xrefstm_entries = Vec::new();
    xrefstm_entries.push(2u8); // type: compressed
    xrefstm_entries.extend_from_slice(&2u16.to_be_bytes()); // containing stream: object 2
    xrefstm_entries.push(0); // index within stream
    let xrefstm_dict = format!(
        "<< /Type /XRef /W [1 2 1] /Size 11 /Index [10 1] /Length {} >>",
        xrefstm_entries.len()
    );
    let xrefstm_offset = write_at(&mut data, format!("3 0 obj\n{}\nstream\n", xrefstm_dict).as_bytes());
    data.extend_from_slice(&xrefstm_entries);
    data.extend_from_slice(b"\nendstream\nendobj\n");

    // Classic xref covering objects 0-2, with /XRefStm pointing at object 3.
    let classic_offset = write_at(&mut data, b"xref\n0 3\n");
    data.extend_from_slice(b"0000000000 65535 f \n");
    data.extend_from_slice(format!("{:010} {:05} n \n", obj1, 0).as_bytes());
    data.extend_from_slice(format!("{:010} {:05} n \n", obj2, 0).as_bytes());
    data.extend_from_slice(format!("trailer\n<< /Size 11 /Root 1 0 R /XRefStm {} >>\n", xrefstm_offset).as_bytes());
    data.extend_from_slice(format!("startxref\n{}\n%%EOF", classic_offset).as_bytes());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hybrid.pdf");
    std::fs::write(&path, &data).unwrap();

    let doc = PdfDocument::open(&path).unwrap();
    let compressed = doc.resolve(Reference::new(10, 0)).unwrap();
    assert_eq!(compressed.as_dict().unwrap().get(b"Type").unwrap().as_name(), Some(&b"Page"[..]));

    let entry = doc.xref().get(10).unwrap();
    assert_eq!(entry.stream_object_number, 2);
}

/// Scenario 3: two xref sections linked by `/Prev`, both defining object 5.
/// The resolved value must come from the later (file-tail) section.
#[test]
fn incremental_update_resolves_to_the_later_revision() {
    let mut data = Vec::new();
    write_at(&mut data, b"%PDF-1.4\n");

    let obj1 = write_at(&mut data, b"1 0 obj\n<< /Type /Catalog /Value 5 0 R >>\nendobj\n");
    let obj5_old = write_at(&mut data, b"5 0 obj\n(old)\nendobj\n");

    let base_xref_offset = write_at(&mut data, b"xref\n0 6\n");
    data.extend_from_slice(b"0000000000 65535 f \n");
    data.extend_from_slice(format!("{:010} {:05} n \n", obj1, 0).as_bytes());
    data.extend_from_slice(b"0000000000 00000 f \n");
    data.extend_from_slice(b"0000000000 00000 f \n");
    data.extend_from_slice(b"0000000000 00000 f \n");
    data.extend_from_slice(format!("{:010} {:05} n \n", obj5_old, 0).as_bytes());
    data.extend_from_slice(b"trailer\n<< /Size 6 /Root 1 0 R >>\n");
    data.extend_from_slice(format!("startxref\n{}\n%%EOF\n", base_xref_offset).as_bytes());

    let obj5_new = write_at(&mut data, b"5 0 obj\n(new)\nendobj\n");
    let update_xref_offset = write_at(&mut data, b"xref\n5 1\n");
    data.extend_from_slice(format!("{:010} {:05} n \n", obj5_new, 0).as_bytes());
    data.extend_from_slice(format!("trailer\n<< /Size 6 /Root 1 0 R /Prev {} >>\n", base_xref_offset).as_bytes());
    data.extend_from_slice(format!("startxref\n{}\n%%EOF", update_xref_offset).as_bytes());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("incremental.pdf");
    std::fs::write(&path, &data).unwrap();

    let doc = PdfDocument::open(&path).unwrap();
    assert_eq!(doc.xref().get(5).unwrap().byte_offset, obj5_new);

    let value = doc.resolve(Reference::new(5, 0)).unwrap();
    assert_eq!(value.as_string_bytes(), Some(&b"new"[..]));
}

/// Scenario 4: dictionaries A and B both reference dictionary C. The
/// written output must contain exactly one `endobj` body for C, and both A
/// and B must carry the same `N G R` token for it.
#[test]
fn shared_subdictionary_is_emitted_exactly_once() {
    let c = DictNode::new();
    c.insert(b"Type".to_vec(), PdfValue::Name(b"SharedC".to_vec()));

    let a = DictNode::new();
    a.insert(b"C".to_vec(), PdfValue::Dictionary(c.clone()));
    let b = DictNode::new();
    b.insert(b"C".to_vec(), PdfValue::Dictionary(c.clone()));

    let root = DictNode::new();
    root.insert(b"A".to_vec(), PdfValue::Dictionary(a));
    root.insert(b"B".to_vec(), PdfValue::Dictionary(b));

    let output = write_document(Vec::new(), &PdfValue::Dictionary(root), &WriterOptions::tabular()).unwrap();
    let text = String::from_utf8(output).unwrap();

    assert_eq!(text.matches("/Type /SharedC").count(), 1);

    let c_ref = c.reference().unwrap();
    let token = format!("{} {} R", c_ref.object_number, c_ref.generation_number);
    assert_eq!(text.matches(&token).count(), 2);

    let object_header = format!("{} {} obj", c_ref.object_number, c_ref.generation_number);
    assert_eq!(text.matches(&object_header).count(), 1);
}

/// Scenario 5: `D[/Self] = D`. The write pass must terminate, emit exactly
/// one object body for D, and `/Self` must be a self-referencing `N G R`.
#[test]
fn cyclic_dictionary_write_terminates_with_a_self_reference() {
    let d = DictNode::new();
    d.insert(b"Self".to_vec(), PdfValue::Dictionary(d.clone()));

    let output = write_document(Vec::new(), &PdfValue::Dictionary(d.clone()), &WriterOptions::tabular()).unwrap();
    let text = String::from_utf8(output).unwrap();

    let reference = d.reference().unwrap();
    let object_header = format!("{} {} obj", reference.object_number, reference.generation_number);
    assert_eq!(text.matches(&object_header).count(), 1);
    assert_eq!(text.matches("endobj").count(), 1);

    let self_token = format!("/Self {} {} R", reference.object_number, reference.generation_number);
    assert!(text.contains(&self_token));
}

/// Scenario 6: a stream's stale `/Length` is rewritten on write, and the
/// rewritten value survives a full write-then-reopen round trip.
#[test]
fn stream_length_survives_a_full_round_trip() {
    let stream_dict = DictNode::new();
    stream_dict.insert(b"Length".to_vec(), PdfValue::Number(PdfNumber::integer(999)));
    let stream = StreamNode::new(stream_dict, bytes::Bytes::from_static(b"hello world"));

    let catalog = DictNode::new();
    catalog.insert(b"Type".to_vec(), PdfValue::Name(b"Catalog".to_vec()));
    catalog.insert(b"Contents".to_vec(), PdfValue::Stream(stream));

    let bytes = write_document(Vec::new(), &PdfValue::Dictionary(catalog), &WriterOptions::tabular()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.pdf");
    std::fs::write(&path, &bytes).unwrap();

    let doc = PdfDocument::open(&path).unwrap();
    let catalog = doc.catalog().unwrap();
    let contents_ref = catalog.get(b"Contents").unwrap().as_reference().unwrap();
    let contents = doc.resolve(contents_ref).unwrap();
    let stream = contents.as_stream().unwrap();

    assert_eq!(stream.dict.get(b"Length").unwrap().as_i64(), Some(11));
    assert_eq!(stream.raw_bytes(), bytes::Bytes::from_static(b"hello world"));
}

/// A free-standing exercise of `locate_and_parse_xref` against a
/// manually-assembled `CrossRefTable`, confirming entries built directly
/// (without going through the byte parser) behave the same as parsed ones.
#[test]
fn manually_built_table_resolves_like_a_parsed_one() {
    let mut xref = CrossRefTable::new();
    xref.add_entry(1, XRefEntry::uncompressed(0, 0));
    let trailer = DictNode::new();
    trailer.insert(b"Size".to_vec(), PdfValue::Number(PdfNumber::integer(2)));
    trailer.insert(b"Root".to_vec(), PdfValue::Indirect(Reference::new(1, 0)));
    xref.set_trailer(trailer);

    let data = b"1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
    let resolver = pdf_graph::resolver::Resolver::new(std::io::Cursor::new(data), xref, default_registry());
    let value = resolver.resolve(Reference::new(1, 0)).unwrap();
    assert_eq!(value.as_dict().unwrap().get(b"Type").unwrap().as_name(), Some(&b"Catalog"[..]));
}
