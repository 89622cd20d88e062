//! Cross-reference table parser.
//!
//! The xref table maps object numbers to byte offsets in the PDF file,
//! enabling random access to PDF objects. Supports both traditional xref
//! tables (PDF 1.0-1.4) and cross-reference streams (PDF 1.5+), hybrid
//! files carrying both via `/XRefStm`, and `/Prev`-chained incremental
//! updates.

use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use crate::decoders::{DecodeParams, FilterRegistry};
use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;
use crate::value::{DictNode, PdfValue};

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryKind {
    /// Entry for a free object (part of the free-list, not a live object).
    Free,
    /// Entry for an uncompressed object, addressed by byte offset.
    Uncompressed,
    /// Entry for an object packed inside an `/ObjStm` object stream.
    Compressed,
}

/// Cross-reference table entry.
///
/// Carries either a byte offset and generation (uncompressed), a containing
/// object-stream number and index (compressed), or free-list linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Which of the three forms this entry takes.
    pub kind: XRefEntryKind,
    /// Byte offset (`Uncompressed`) or next free object number (`Free`).
    pub byte_offset: u64,
    /// Generation number (`Uncompressed`/`Free`).
    pub generation: u16,
    /// Containing `/ObjStm` object number (`Compressed` only).
    pub stream_object_number: u32,
    /// Index within the containing object stream (`Compressed` only).
    pub index_in_stream: u32,
}

impl XRefEntry {
    /// A live, uncompressed entry at `byte_offset`.
    pub fn uncompressed(byte_offset: u64, generation: u16) -> Self {
        XRefEntry {
            kind: XRefEntryKind::Uncompressed,
            byte_offset,
            generation,
            stream_object_number: 0,
            index_in_stream: 0,
        }
    }

    /// A live entry packed into an object stream.
    pub fn compressed(stream_object_number: u32, index_in_stream: u32) -> Self {
        XRefEntry {
            kind: XRefEntryKind::Compressed,
            byte_offset: 0,
            generation: 0,
            stream_object_number,
            index_in_stream,
        }
    }

    /// A free-list entry linking to the next free object number.
    pub fn free(next_free: u64, generation: u16) -> Self {
        XRefEntry {
            kind: XRefEntryKind::Free,
            byte_offset: next_free,
            generation,
            stream_object_number: 0,
            index_in_stream: 0,
        }
    }

    /// Whether this entry describes a live (in-use) object.
    pub fn is_in_use(&self) -> bool {
        !matches!(self.kind, XRefEntryKind::Free)
    }
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    pub(crate) entries: std::collections::HashMap<u32, XRefEntry>,
    trailer: Option<DictNode>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self {
            entries: std::collections::HashMap::new(),
            trailer: None,
        }
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: DictNode) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&DictNode> {
        self.trailer.as_ref()
    }

    /// Add an entry to the cross-reference table, overwriting any existing
    /// entry for the same object number.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Check if an object exists in the xref table.
    pub fn contains(&self, object_number: u32) -> bool {
        self.entries.contains_key(&object_number)
    }

    /// Get all object numbers in the table.
    pub fn all_object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Merge entries from an earlier (in file position) xref section.
    ///
    /// First occurrence wins: an entry already present (because it was seen
    /// later in file time, i.e. earlier in the walk) is never replaced by an
    /// older one. This is the same rule an incremental-update chain or a
    /// hybrid-file `/XRefStm` merge needs.
    pub fn merge_from(&mut self, other: CrossRefTable) {
        for (obj_num, entry) in other.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = other.trailer;
        }
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CrossRefTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the byte offset of the xref table by scanning from the end of the file.
///
/// Searches for the `startxref` keyword in the last portion of the file,
/// then extracts the offset that follows it.
pub fn find_xref_offset<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let file_size = reader.seek(SeekFrom::End(0))?;

    let read_size = std::cmp::min(2048, file_size);
    reader.seek(SeekFrom::End(-(read_size as i64)))?;

    let mut buf = Vec::new();
    reader.take(read_size).read_to_end(&mut buf)?;

    let content = String::from_utf8_lossy(&buf);
    let startxref_pos = content.rfind("startxref").ok_or(Error::XrefMissing)?;
    let after_keyword = &content[startxref_pos + "startxref".len()..];

    for line in split_lines_str(after_keyword) {
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return trimmed.parse::<u64>().map_err(|_| Error::XrefMissing);
        }
    }

    Err(Error::XrefMissing)
}

/// Parse the cross-reference table at the given byte offset, following any
/// `/XRefStm` hybrid section and `/Prev` chain to completion.
///
/// # Errors
///
/// `Error::XrefLoop` if an offset is revisited during the walk,
/// `Error::XrefMalformed` if a section cannot be parsed as either form.
pub fn parse_xref<R: Read + Seek>(reader: &mut R, offset: u64, registry: &FilterRegistry) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    parse_xref_chain(reader, offset, &mut visited, registry)
}

fn parse_xref_chain<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    visited: &mut HashSet<u64>,
    registry: &FilterRegistry,
) -> Result<CrossRefTable> {
    if !visited.insert(offset) {
        return Err(Error::XrefLoop(offset));
    }

    let mut xref = parse_xref_section(reader, offset, registry)?;

    // A hybrid file's /XRefStm describes compressed-object entries current
    // as of this same revision, so it must be merged before /Prev.
    if let Some(xref_stm_offset) = xref.trailer().and_then(|t| t.get(b"XRefStm")).and_then(|v| v.as_i64()) {
        let hybrid = parse_xref_chain(reader, xref_stm_offset as u64, visited, registry)?;
        xref.merge_from(hybrid);
    }

    if let Some(prev_offset) = xref.trailer().and_then(|t| t.get(b"Prev")).and_then(|v| v.as_i64()) {
        let prev = parse_xref_chain(reader, prev_offset as u64, visited, registry)?;
        xref.merge_from(prev);
    }

    Ok(xref)
}

fn parse_xref_section<R: Read + Seek>(reader: &mut R, offset: u64, registry: &FilterRegistry) -> Result<CrossRefTable> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut peek_buf = [0u8; 20];
    let bytes_read = reader.read(&mut peek_buf)?;

    let trimmed = trim_ascii(&peek_buf[..bytes_read]);

    log::debug!("parsing xref at offset {}, peek: {:?}", offset, String::from_utf8_lossy(trimmed));

    if trimmed.starts_with(b"xref") {
        log::debug!("detected traditional xref at offset {}", offset);
        reader.seek(SeekFrom::Start(offset))?;
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        parse_traditional_xref(&content)
    } else if trimmed.first().is_some_and(|c| c.is_ascii_digit()) {
        parse_xref_stream_section(reader, offset, registry)
    } else {
        Err(Error::XrefMalformed(format!("unrecognized xref section at offset {}", offset)))
    }
}

/// Parse a traditional cross-reference table (PDF 1.0-1.4).
///
/// ```text
/// xref
/// 0 6
/// 0000000000 65535 f
/// 0000000018 00000 n
/// ...
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
fn parse_traditional_xref(content: &[u8]) -> Result<CrossRefTable> {
    let lines: Vec<(&[u8], usize)> = ByteLines::new(content).collect();
    let mut xref = CrossRefTable::new();
    let mut line_idx = 0;

    while line_idx < lines.len() {
        let trimmed = trim_ascii(lines[line_idx].0);
        if trimmed.is_empty() {
            line_idx += 1;
            continue;
        }
        if trimmed.starts_with(b"xref") {
            line_idx += 1;
            break;
        }
        return Err(Error::XrefMalformed("expected 'xref' keyword".to_string()));
    }

    while line_idx < lines.len() {
        let (raw_line, line_start) = lines[line_idx];
        let trimmed = trim_ascii(raw_line);
        line_idx += 1;

        if trimmed.starts_with(b"trailer") {
            let rest = &content[line_start + 7..];
            if let Ok((_, value)) = crate::parser::parse_value(rest) {
                if let Some(dict) = value.as_dict() {
                    xref.set_trailer(dict.clone());
                }
            }
            return Ok(xref);
        }

        if trimmed.is_empty() || trimmed.starts_with(b"%") {
            continue;
        }

        let parts: Vec<&[u8]> = split_ascii_whitespace(trimmed);
        if parts.len() != 2 {
            continue;
        }

        let start_obj: u32 = parse_ascii_uint(parts[0]).ok_or_else(|| Error::XrefMalformed("bad subsection header".to_string()))?;
        let count: u32 = parse_ascii_uint(parts[1]).ok_or_else(|| Error::XrefMalformed("bad subsection header".to_string()))?;

        if count > 1_000_000 {
            return Err(Error::XrefMalformed("xref subsection count exceeds limit".to_string()));
        }

        let mut i = 0;
        while i < count && line_idx < lines.len() {
            let (raw_line, _) = lines[line_idx];
            let trimmed = trim_ascii(raw_line);
            line_idx += 1;

            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with(b"trailer") {
                log::warn!("expected {} entries but only found {} before trailer", count, i);
                line_idx -= 1;
                break;
            }

            let parts: Vec<&[u8]> = split_ascii_whitespace(trimmed);
            if parts.len() < 3 {
                log::warn!("malformed xref entry (too few parts) at index {}", i);
                xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                i += 1;
                continue;
            }

            let offset = match parse_ascii_uint::<u64>(parts[0]) {
                Some(v) => v,
                None => {
                    log::warn!("failed to parse offset at index {}", i);
                    xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                    i += 1;
                    continue;
                },
            };

            let generation = match parse_ascii_uint::<u16>(parts[1]) {
                Some(v) => v,
                None => {
                    log::warn!("failed to parse generation at index {}", i);
                    xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                    i += 1;
                    continue;
                },
            };

            let type_char = parts[2].first().copied().unwrap_or(b'?').to_ascii_lowercase();
            let entry = match type_char {
                b'n' => XRefEntry::uncompressed(offset, generation),
                b'f' => XRefEntry::free(offset, generation),
                _ => {
                    log::warn!("invalid type flag at index {}, treating as free", i);
                    XRefEntry::free(offset, generation)
                },
            };

            xref.add_entry(start_obj + i, entry);
            i += 1;
        }
    }

    Ok(xref)
}

/// Parse a cross-reference stream (PDF 1.5+): a stream object with
/// `/Type /XRef` whose decoded bytes hold fixed-width binary entries.
fn parse_xref_stream_section<R: Read + Seek>(reader: &mut R, offset: u64, registry: &FilterRegistry) -> Result<CrossRefTable> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;

    let (_reference, value) = crate::parser::parse_indirect_object(&content)?;
    let stream = value.as_stream().ok_or_else(|| Error::XrefMalformed("xref entry is not a stream".to_string()))?;
    let dict = &stream.dict;

    if let Some(type_value) = dict.get(b"Type") {
        if let Some(type_name) = type_value.as_name() {
            if type_name != b"XRef" {
                return Err(Error::XrefMalformed(format!("expected /Type /XRef, got /Type /{}", String::from_utf8_lossy(type_name))));
            }
        }
    }

    let w_value = dict.get(b"W").ok_or_else(|| Error::XrefMalformed("missing /W array in xref stream".to_string()))?;
    let w_array = w_value.as_array().ok_or_else(|| Error::XrefMalformed("invalid /W in xref stream".to_string()))?;
    if w_array.len() != 3 {
        return Err(Error::XrefMalformed("invalid /W array length".to_string()));
    }
    let w1 = w_array.get(0).and_then(|v| v.as_i64()).ok_or_else(|| Error::XrefMalformed("invalid /W[0]".to_string()))? as usize;
    let w2 = w_array.get(1).and_then(|v| v.as_i64()).ok_or_else(|| Error::XrefMalformed("invalid /W[1]".to_string()))? as usize;
    let w3 = w_array.get(2).and_then(|v| v.as_i64()).ok_or_else(|| Error::XrefMalformed("invalid /W[2]".to_string()))? as usize;
    let entry_size = w1 + w2 + w3;

    let size = dict.get(b"Size").and_then(|v| v.as_i64()).ok_or_else(|| Error::XrefMalformed("missing /Size in xref stream".to_string()))? as u32;

    let index_ranges: Vec<(u32, u32)> = match dict.get(b"Index") {
        Some(index_value) => {
            let index_array = index_value.as_array().ok_or_else(|| Error::XrefMalformed("invalid /Index".to_string()))?;
            let elements = index_array.elements();
            let mut ranges = Vec::new();
            for pair in elements.chunks(2) {
                if pair.len() != 2 {
                    return Err(Error::XrefMalformed("odd-length /Index array".to_string()));
                }
                let start = pair[0].as_i64().ok_or_else(|| Error::XrefMalformed("invalid index start".to_string()))? as u32;
                let count = pair[1].as_i64().ok_or_else(|| Error::XrefMalformed("invalid index count".to_string()))? as u32;
                ranges.push((start, count));
            }
            ranges
        },
        None => vec![(0, size)],
    };

    let decode_params = dict.get(b"DecodeParms").and_then(|v| extract_decode_params(&v));

    let filters: Vec<String> = match dict.get(b"Filter") {
        Some(PdfValue::Name(name)) => vec![String::from_utf8_lossy(&name).to_string()],
        Some(PdfValue::Array(arr)) => {
            arr.elements().iter().filter_map(|v| v.as_name().map(|n| String::from_utf8_lossy(n).to_string())).collect()
        },
        None => Vec::new(),
        _ => return Err(Error::XrefMalformed("invalid /Filter in xref stream".to_string())),
    };

    let raw = stream.raw_bytes();
    let decoded_data = if filters.is_empty() {
        raw.to_vec()
    } else {
        crate::decoders::decode_stream_with_params(&raw, &filters, decode_params.as_ref(), registry)?
    };

    let mut xref = CrossRefTable::new();
    let mut data_pos = 0;

    for (start_obj, count) in index_ranges {
        for i in 0..count {
            if data_pos + entry_size > decoded_data.len() {
                return Err(Error::XrefMalformed("truncated xref stream data".to_string()));
            }

            let entry_data = &decoded_data[data_pos..data_pos + entry_size];
            data_pos += entry_size;

            let entry_type = if w1 > 0 { read_int(&entry_data[0..w1]) } else { 1 };
            let field2 = read_int(&entry_data[w1..w1 + w2]);
            let field3 = read_int(&entry_data[w1 + w2..w1 + w2 + w3]);

            let entry = match entry_type {
                0 => XRefEntry::free(field2, field3 as u16),
                1 => XRefEntry::uncompressed(field2, field3 as u16),
                2 => XRefEntry::compressed(field2 as u32, field3 as u32),
                other => return Err(Error::XrefMalformed(format!("invalid xref entry type: {}", other))),
            };

            xref.add_entry(start_obj + i, entry);
        }
    }

    xref.set_trailer(dict.clone());
    Ok(xref)
}

/// Extract decode parameters from a `/DecodeParms` value, which may be
/// either a dictionary or an array of dictionaries (one per filter stage).
fn extract_decode_params(decode_params_value: &PdfValue) -> Option<DecodeParams> {
    let dict = match decode_params_value {
        PdfValue::Dictionary(d) => d.clone(),
        PdfValue::Array(arr) => arr.elements().into_iter().find_map(|v| match v {
            PdfValue::Dictionary(d) => Some(d),
            _ => None,
        })?,
        _ => return None,
    };

    let predictor = dict.get(b"Predictor").and_then(|v| v.as_i64()).unwrap_or(1);
    let columns = dict.get(b"Columns").and_then(|v| v.as_i64()).unwrap_or(1) as usize;
    let colors = dict.get(b"Colors").and_then(|v| v.as_i64()).unwrap_or(1) as usize;
    let bits_per_component = dict.get(b"BitsPerComponent").and_then(|v| v.as_i64()).unwrap_or(8) as usize;

    Some(DecodeParams { predictor, columns, colors, bits_per_component })
}

/// Read an integer from a byte slice (big-endian).
fn read_int(bytes: &[u8]) -> u64 {
    let mut result: u64 = 0;
    for &byte in bytes {
        result = (result << 8) | (byte as u64);
    }
    result
}

fn trim_ascii(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|&c| !c.is_ascii_whitespace()).unwrap_or(b.len());
    let end = b.iter().rposition(|&c| !c.is_ascii_whitespace()).map(|p| p + 1).unwrap_or(start);
    &b[start..end]
}

fn split_ascii_whitespace(b: &[u8]) -> Vec<&[u8]> {
    b.split(|c| c.is_ascii_whitespace()).filter(|p| !p.is_empty()).collect()
}

fn parse_ascii_uint<T: std::str::FromStr>(b: &[u8]) -> Option<T> {
    std::str::from_utf8(b).ok()?.parse().ok()
}

/// Split a string into lines, handling LF, CRLF, and standalone CR (some
/// PDFs use Mac-style line endings in the trailing `startxref` footer).
fn split_lines_str(text: &str) -> Vec<String> {
    split_lines_bytes_generic(text.as_bytes()).into_iter().map(|l| String::from_utf8_lossy(l).into_owned()).collect()
}

fn split_lines_bytes_generic(data: &[u8]) -> Vec<&[u8]> {
    ByteLines::new(data).map(|(line, _)| line).collect()
}

/// Iterates lines of a byte buffer, handling LF, CRLF, and standalone CR,
/// yielding each line's content alongside its starting byte offset.
struct ByteLines<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteLines<'a> {
    fn new(data: &'a [u8]) -> Self {
        ByteLines { data, pos: 0 }
    }
}

impl<'a> Iterator for ByteLines<'a> {
    type Item = (&'a [u8], usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        let mut i = self.pos;
        while i < self.data.len() && self.data[i] != b'\r' && self.data[i] != b'\n' {
            i += 1;
        }
        let line = &self.data[start..i];
        if i < self.data.len() {
            if self.data[i] == b'\r' && i + 1 < self.data.len() && self.data[i + 1] == b'\n' {
                self.pos = i + 2;
            } else {
                self.pos = i + 1;
            }
        } else {
            self.pos = i;
        }
        Some((line, start))
    }
}

/// Locate and fully resolve the cross-reference chain for a file: starts
/// from the `startxref`-pointed offset, falls back to a forward linear scan
/// for `xref`/`/Type /XRef` if that location is garbage, and finally
/// delegates to [`crate::xref_reconstruction::reconstruct_xref`] if neither
/// succeeds.
pub fn locate_and_parse_xref<R: Read + Seek>(reader: &mut R, options: &ParserOptions, registry: &FilterRegistry) -> Result<CrossRefTable> {
    if let Ok(offset) = find_xref_offset(reader) {
        if let Ok(xref) = parse_xref(reader, offset, registry) {
            log::info!("xref located via startxref at offset {}", offset);
            return Ok(xref);
        }
        log::warn!("startxref offset {} did not yield a parseable xref, falling back to linear scan", offset);
    } else {
        log::warn!("no startxref found, falling back to linear scan");
    }

    if let Some(offset) = forward_scan_for_xref(reader)? {
        if let Ok(xref) = parse_xref(reader, offset, registry) {
            log::info!("xref located via forward scan at offset {}", offset);
            return Ok(xref);
        }
    }

    if !options.allow_malformed_streams && options.strict {
        return Err(Error::XrefMissing);
    }

    log::warn!("xref reconstruction invoked: no parseable cross-reference section found");
    let (xref, trailer) = crate::xref_reconstruction::reconstruct_xref(reader)?;
    let mut xref = xref;
    xref.set_trailer(trailer);
    Ok(xref)
}

/// Scan forward from the start of the file for either an `xref` keyword or
/// an indirect object whose dictionary carries `/Type /XRef`.
fn forward_scan_for_xref<R: Read + Seek>(reader: &mut R) -> Result<Option<u64>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;

    if let Some(pos) = find_subslice(&content, b"xref") {
        return Ok(Some(pos as u64));
    }

    if let Some(pos) = find_subslice(&content, b"/Type /XRef").or_else(|| find_subslice(&content, b"/Type/XRef")) {
        // Back up to the nearest preceding "N G obj" header.
        if let Some(obj_start) = content[..pos].rfind_obj_header() {
            return Ok(Some(obj_start as u64));
        }
    }

    Ok(None)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

trait RfindObjHeader {
    fn rfind_obj_header(&self) -> Option<usize>;
}

impl RfindObjHeader for [u8] {
    fn rfind_obj_header(&self) -> Option<usize> {
        let obj_kw = find_last_subslice(self, b"obj")?;
        let before = trim_ascii(&self[..obj_kw]);
        let parts = split_ascii_whitespace(before);
        if parts.len() < 2 {
            return None;
        }
        // Find the byte offset where the object-number digits begin,
        // scanning back from the "obj" keyword.
        let mut i = obj_kw;
        // skip whitespace and generation digits
        while i > 0 && self[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
        while i > 0 && self[i - 1].is_ascii_digit() {
            i -= 1;
        }
        while i > 0 && self[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
        while i > 0 && self[i - 1].is_ascii_digit() {
            i -= 1;
        }
        Some(i)
    }
}

fn find_last_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).rev().find(|&i| &haystack[i..i + needle.len()] == needle)
}
