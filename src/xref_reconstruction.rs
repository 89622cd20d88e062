//! Cross-reference table reconstruction for damaged PDFs.
//!
//! When the xref table is corrupted, missing, or incomplete, this module
//! reconstructs it by scanning the entire file for `N G obj` markers. This is
//! a fallback used only when standard xref parsing fails.

use crate::error::{Error, Result};
use crate::value::{DictNode, PdfValue, Reference};
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};

lazy_static! {
    /// Matches `N G obj` patterns throughout a file.
    static ref RE_OBJ_PATTERN: regex::bytes::Regex = regex::bytes::Regex::new(r"(\d+)\s+(\d+)\s+obj").unwrap();

    /// Matches the `trailer <<` keyword sequence.
    static ref RE_TRAILER: regex::bytes::Regex = regex::bytes::Regex::new(r"trailer\s*<<").unwrap();
}

/// Reconstruct the cross-reference table by scanning the entire file for
/// object markers, then locate or synthesize a trailer dictionary.
///
/// Scans the whole file once; later occurrences of an object number win, on
/// the theory that a damaged file's last write of an object is its most
/// current revision. Returns [`Error::XrefMissing`] if no objects are found.
pub fn reconstruct_xref<R: Read + Seek>(reader: &mut R) -> Result<(CrossRefTable, DictNode)> {
    log::info!("reconstructing xref table by scanning file");

    reader.seek(SeekFrom::Start(0))?;
    let mut contents = Vec::new();
    reader.read_to_end(&mut contents)?;

    log::debug!("file size: {} bytes", contents.len());

    let mut xref = CrossRefTable::new();
    let mut objects_found = 0;

    for capture in RE_OBJ_PATTERN.captures_iter(&contents) {
        let full_match = capture.get(0).unwrap();
        let obj_num_bytes = capture.get(1).unwrap().as_bytes();
        let gen_num_bytes = capture.get(2).unwrap().as_bytes();

        let obj_num: u32 = match std::str::from_utf8(obj_num_bytes).ok().and_then(|s| s.parse().ok()) {
            Some(n) => n,
            None => {
                log::warn!("failed to parse object number at offset {}", full_match.start());
                continue;
            },
        };

        let gen_num: u16 = match std::str::from_utf8(gen_num_bytes).ok().and_then(|s| s.parse().ok()) {
            Some(n) => n,
            None => {
                log::warn!("failed to parse generation number at offset {}", full_match.start());
                continue;
            },
        };

        let offset = full_match.start() as u64;

        // Reject matches not actually followed by object syntax: strings,
        // comments, and corrupted data can otherwise produce false positives.
        let validation_start = offset + full_match.as_bytes().len() as u64;
        if validation_start < contents.len() as u64 {
            let remaining = &contents[validation_start as usize..];

            let mut i = 0;
            while i < remaining.len() && remaining[i].is_ascii_whitespace() {
                i += 1;
            }

            if i < remaining.len() {
                let next_byte = remaining[i];
                let is_valid_object_start =
                    matches!(next_byte, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-') || next_byte.is_ascii_digit();

                if !is_valid_object_start {
                    log::debug!("skipping false positive object header at offset {} (next byte 0x{:02x})", offset, next_byte);
                    continue;
                }
            }
        }

        // Last occurrence wins: a later write of the same object number
        // supersedes an earlier one in an incrementally-updated file.
        let entry = XRefEntry::uncompressed(offset, gen_num);
        xref.add_entry(obj_num, entry);
        objects_found += 1;
    }

    log::info!("reconstructed xref with {} objects", objects_found);

    if objects_found == 0 {
        return Err(Error::XrefMissing);
    }

    let trailer = find_trailer(&contents, reader, &xref)?;

    Ok((xref, trailer))
}

/// Search for a `trailer` keyword and parse the dictionary that follows,
/// falling back to a synthesized minimal trailer if none is found or it
/// fails to parse.
fn find_trailer<R: Read + Seek>(contents: &[u8], reader: &mut R, xref: &CrossRefTable) -> Result<DictNode> {
    log::debug!("searching for trailer dictionary");

    if let Some(mat) = RE_TRAILER.find(contents) {
        let trailer_start = mat.start();
        log::debug!("found trailer keyword at offset {}", trailer_start);

        let trailer_keyword_end = trailer_start + 7;
        let input = &contents[trailer_keyword_end..];

        match crate::parser::parse_value(input) {
            Ok((_, PdfValue::Dictionary(dict))) => {
                log::info!("parsed trailer dictionary from file");
                return Ok(dict);
            },
            Ok((_, other)) => {
                log::warn!("trailer keyword not followed by a dictionary (found {})", other.type_name());
            },
            Err(e) => {
                log::warn!("failed to parse trailer dictionary: {:?}", e);
            },
        }
    }

    log::info!("reconstructing minimal trailer dictionary");
    reconstruct_minimal_trailer(reader, xref)
}

/// Scan up to 100 in-use objects looking for one with `/Type /Catalog`, and
/// synthesize a minimal `{Root, Size}` trailer from it.
fn reconstruct_minimal_trailer<R: Read + Seek>(reader: &mut R, xref: &CrossRefTable) -> Result<DictNode> {
    log::debug!("scanning objects to find the catalog");

    let mut catalog_ref = None;

    for (idx, obj_num) in xref.all_object_numbers().enumerate() {
        if idx >= 100 {
            break;
        }

        if let Some(entry) = xref.get(obj_num) {
            if !entry.is_in_use() {
                continue;
            }

            match load_object_at_offset(reader, entry.byte_offset) {
                Ok(value) => {
                    if is_catalog(&value) {
                        log::info!("found catalog: object {} gen {}", obj_num, entry.generation);
                        catalog_ref = Some((obj_num, entry.generation));
                        break;
                    }
                },
                Err(e) => {
                    log::debug!("failed to load object {} at offset {}: {}", obj_num, entry.byte_offset, e);
                    continue;
                },
            }
        }
    }

    let (cat_num, cat_gen) = catalog_ref.ok_or_else(|| Error::XrefMalformed("could not find catalog in reconstructed xref".to_string()))?;

    let trailer = DictNode::new();
    trailer.insert(b"Root".to_vec(), PdfValue::Indirect(Reference::new(cat_num, cat_gen)));
    trailer.insert(b"Size".to_vec(), PdfValue::Number(crate::value::PdfNumber::integer(xref.len() as i64)));

    Ok(trailer)
}

/// Load the object at `offset`, reading line-by-line up to a 1MB cap or
/// until `endobj` appears.
fn load_object_at_offset<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<PdfValue> {
    reader.seek(SeekFrom::Start(offset))?;

    let mut buf_reader = BufReader::new(reader);
    let mut content = Vec::new();

    let mut bytes_read = 0;
    const MAX_OBJECT_SIZE: usize = 1024 * 1024;

    loop {
        let mut line = Vec::new();
        match buf_reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(n) => {
                content.extend_from_slice(&line);
                bytes_read += n;

                if bytes_read > MAX_OBJECT_SIZE {
                    return Err(Error::XrefMalformed("object too large during reconstruction scan".to_string()));
                }

                if content.windows(6).any(|w| w == b"endobj") {
                    break;
                }
            },
            Err(e) => return Err(Error::IoError(e)),
        }
    }

    let (_reference, value) = crate::parser::parse_indirect_object(&content)?;

    Ok(value)
}

/// True if `value` is a dictionary carrying `/Type /Catalog`.
fn is_catalog(value: &PdfValue) -> bool {
    if let Some(dict) = value.as_dict() {
        if let Some(type_value) = dict.get(b"Type") {
            if let Some(type_name) = type_value.as_name() {
                return type_name == b"Catalog";
            }
        }
    }
    false
}

/// Search within a 1KB window around `approx_offset` for an `N G obj`
/// header naming `obj_id`, for xref entries whose offsets have drifted.
pub fn search_nearby_for_object<R: Read + Seek>(reader: &mut R, obj_id: u32, approx_offset: u64) -> Result<PdfValue> {
    log::debug!("searching for object {} near offset {}", obj_id, approx_offset);

    let search_range = 1024u64;
    let start = approx_offset.saturating_sub(search_range);
    let end = approx_offset + search_range;

    reader.seek(SeekFrom::Start(start))?;
    let mut buffer = vec![0u8; (end - start) as usize];
    let bytes_read = reader.read(&mut buffer)?;
    let buffer = &buffer[..bytes_read];

    let pattern = format!(r"{} \d+ obj", obj_id);
    let re = regex::bytes::Regex::new(&pattern).unwrap();

    if let Some(mat) = re.find(buffer) {
        let obj_offset = start + mat.start() as u64;
        log::debug!("found object {} at offset {} (expected {})", obj_id, obj_offset, approx_offset);
        return load_object_at_offset(reader, obj_offset);
    }

    Err(Error::UnresolvedReference(obj_id, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reconstructs_simple_pdf() {
        let pdf_data = b"%PDF-1.4\n\
            1 0 obj\n\
            << /Type /Catalog /Pages 2 0 R >>\n\
            endobj\n\
            2 0 obj\n\
            << /Type /Pages /Count 0 /Kids [] >>\n\
            endobj\n\
            trailer\n\
            << /Root 1 0 R /Size 3 >>\n\
            startxref\n\
            0\n\
            %%EOF";

        let mut cursor = Cursor::new(pdf_data);
        let (xref, trailer) = reconstruct_xref(&mut cursor).unwrap();

        assert!(xref.contains(1));
        assert!(xref.contains(2));
        assert!(trailer.contains_key(b"Root"));
    }

    #[test]
    fn synthesizes_trailer_when_missing() {
        let pdf_data = b"%PDF-1.4\n\
            1 0 obj\n\
            << /Type /Catalog /Pages 2 0 R >>\n\
            endobj\n\
            2 0 obj\n\
            << /Type /Pages /Count 0 /Kids [] >>\n\
            endobj\n\
            %%EOF";

        let mut cursor = Cursor::new(pdf_data);
        let (xref, trailer) = reconstruct_xref(&mut cursor).unwrap();

        assert!(xref.contains(1));
        let root = trailer.get(b"Root").unwrap();
        assert_eq!(root.as_reference(), Some(Reference::new(1, 0)));
    }

    #[test]
    fn is_catalog_checks_type_name() {
        let dict = DictNode::new();
        dict.insert(b"Type".to_vec(), PdfValue::Name(b"Catalog".to_vec()));
        assert!(is_catalog(&PdfValue::Dictionary(dict)));

        assert!(!is_catalog(&PdfValue::Number(crate::value::PdfNumber::integer(42))));
    }

    #[test]
    fn no_objects_found_is_xref_missing() {
        let pdf_data = b"%PDF-1.4\nThis is not a valid PDF with objects\n%%EOF";

        let mut cursor = Cursor::new(pdf_data.as_slice());
        let result = reconstruct_xref(&mut cursor);

        assert!(matches!(result, Err(Error::XrefMissing)));
    }

    #[test]
    fn false_positive_object_headers_are_skipped() {
        let pdf_data = b"%PDF-1.4\n\
            (this string mentions 99 0 obj but is not one)\n\
            1 0 obj\n\
            << /Type /Catalog /Pages 2 0 R >>\n\
            endobj\n\
            2 0 obj\n\
            << /Type /Pages /Count 0 /Kids [] >>\n\
            endobj\n\
            trailer\n\
            << /Root 1 0 R /Size 3 >>\n\
            %%EOF";

        let mut cursor = Cursor::new(pdf_data);
        let (xref, _) = reconstruct_xref(&mut cursor).unwrap();
        assert!(!xref.contains(99));
        assert!(xref.contains(1));
    }
}
