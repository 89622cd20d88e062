//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (`/Type /ObjStm`) pack multiple objects into a single
//! compressed stream for better compression ratios.
//!
//! ```text
//! N 0 obj
//! << /Type /ObjStm
//!    /N 5              % Number of objects in stream
//!    /First 30         % Byte offset to first object's data
//!    /Filter /FlateDecode
//! >>
//! stream
//! 10 0 11 15 12 28 13 42 14 55    % Pairs: (obj_num, offset)
//! <dict>                           % Object 10 at offset 0
//! <array>                          % Object 11 at offset 15
//! ...
//! endstream
//! endobj
//! ```
//!
//! The header holds N pairs of integers (object number, byte offset relative
//! to `/First`); the body holds the actual object data.

use std::collections::HashMap;

use crate::decoders::FilterRegistry;
use crate::error::{Error, Result};
use crate::value::{PdfValue, StreamNode};

/// Parse an object stream, decoding its filter chain and returning every
/// object it holds, keyed by object number.
pub fn parse_object_stream(stream: &StreamNode, registry: &FilterRegistry) -> Result<HashMap<u32, PdfValue>> {
    let dict = &stream.dict;

    if let Some(type_value) = dict.get(b"Type") {
        if let Some(type_name) = type_value.as_name() {
            if type_name != b"ObjStm" {
                return Err(Error::ObjectStreamMalformed(format!(
                    "expected /Type /ObjStm, got /Type /{}",
                    String::from_utf8_lossy(type_name)
                )));
            }
        }
    }

    let n = dict.get(b"N").and_then(|v| v.as_i64()).ok_or_else(|| Error::ObjectStreamMalformed("missing /N entry".to_string()))?;
    let first = dict.get(b"First").and_then(|v| v.as_i64()).ok_or_else(|| Error::ObjectStreamMalformed("missing /First entry".to_string()))?;

    if !(0..=1_000_000).contains(&n) {
        return Err(Error::ObjectStreamMalformed(format!("invalid /N value: {}", n)));
    }
    if !(0..=10_000_000).contains(&first) {
        return Err(Error::ObjectStreamMalformed(format!("invalid /First value: {}", first)));
    }

    let n = n as usize;
    let first = first as usize;

    let filters: Vec<String> = match dict.get(b"Filter") {
        Some(PdfValue::Name(name)) => vec![String::from_utf8_lossy(&name).to_string()],
        Some(PdfValue::Array(arr)) => {
            arr.elements().iter().filter_map(|v| v.as_name().map(|n| String::from_utf8_lossy(n).to_string())).collect()
        },
        None => Vec::new(),
        _ => return Err(Error::ObjectStreamMalformed("invalid /Filter".to_string())),
    };

    let raw = stream.raw_bytes();
    let decoded_data = if filters.is_empty() {
        raw.to_vec()
    } else {
        crate::decoders::decode_stream_with_params(&raw, &filters, None, registry)?
    };

    if decoded_data.len() < first {
        return Err(Error::ObjectStreamMalformed(format!(
            "object stream data too short: {} bytes, expected at least {}",
            decoded_data.len(),
            first
        )));
    }

    let pairs_data = &decoded_data[..first];
    let pairs = parse_object_number_pairs(pairs_data, n)?;

    let objects_data = &decoded_data[first..];
    let mut result = HashMap::new();

    for (obj_num, offset_in_data) in pairs {
        if offset_in_data >= objects_data.len() {
            log::warn!("object {} offset {} is beyond stream data length {}", obj_num, offset_in_data, objects_data.len());
            continue;
        }

        let obj_data = &objects_data[offset_in_data..];
        match crate::parser::parse_value(obj_data) {
            Ok((_remaining, value)) => {
                result.insert(obj_num, value);
            },
            Err(e) => {
                log::warn!("failed to parse object {} from stream at offset {}: {:?}", obj_num, offset_in_data, e);
                continue;
            },
        }
    }

    Ok(result)
}

/// Parse the `/First`-preceding header: `count` pairs of `(object_number,
/// relative_offset)`.
fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut remaining = data;

    for i in 0..count {
        remaining = skip_whitespace(remaining);

        let (rest, obj_num_str) =
            read_integer_string(remaining).ok_or_else(|| Error::ObjectStreamMalformed(format!("failed to parse object number for pair {}", i)))?;
        let obj_num: u32 = obj_num_str.parse().map_err(|_| Error::ObjectStreamMalformed(format!("invalid object number: {}", obj_num_str)))?;

        remaining = skip_whitespace(rest);

        let (rest, offset_str) =
            read_integer_string(remaining).ok_or_else(|| Error::ObjectStreamMalformed(format!("failed to parse offset for pair {}", i)))?;
        let offset: usize = offset_str.parse().map_err(|_| Error::ObjectStreamMalformed(format!("invalid offset: {}", offset_str)))?;

        pairs.push((obj_num, offset));
        remaining = rest;
    }

    Ok(pairs)
}

/// Skip PDF whitespace characters: null, tab, LF, FF, CR, space.
fn skip_whitespace(data: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            0 | 9 | 10 | 12 | 13 | 32 => i += 1,
            _ => break,
        }
    }
    &data[i..]
}

/// Read consecutive digit characters (with an optional leading sign).
fn read_integer_string(data: &[u8]) -> Option<(&[u8], String)> {
    if data.is_empty() {
        return None;
    }

    let mut i = 0;
    if data[i] == b'+' || data[i] == b'-' {
        i += 1;
    }

    let start = i;
    while i < data.len() && data[i].is_ascii_digit() {
        i += 1;
    }

    if i == start {
        return None;
    }

    let int_str = String::from_utf8_lossy(&data[..i]).to_string();
    Some((&data[i..], int_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DictNode;
    use bytes::Bytes;

    fn registry() -> FilterRegistry {
        crate::decoders::default_registry()
    }

    #[test]
    fn skip_whitespace_strips_pdf_whitespace() {
        assert_eq!(skip_whitespace(b"   hello"), b"hello");
        assert_eq!(skip_whitespace(b"\t\n\r hello"), b"hello");
        assert_eq!(skip_whitespace(b"hello"), b"hello");
        assert_eq!(skip_whitespace(b""), b"");
    }

    #[test]
    fn read_integer_string_handles_signs() {
        assert_eq!(read_integer_string(b"123 rest"), Some((&b" rest"[..], "123".to_string())));
        assert_eq!(read_integer_string(b"-456 rest"), Some((&b" rest"[..], "-456".to_string())));
        assert_eq!(read_integer_string(b"+789"), Some((&b""[..], "+789".to_string())));
        assert_eq!(read_integer_string(b"notanumber"), None);
        assert_eq!(read_integer_string(b""), None);
    }

    #[test]
    fn parse_pairs_with_whitespace() {
        let data = b"  10   0   11  15  12   28  ";
        let pairs = parse_object_number_pairs(data, 3).unwrap();
        assert_eq!(pairs, vec![(10, 0), (11, 15), (12, 28)]);
    }

    fn build_stream(dict_entries: &[(&[u8], PdfValue)], body: Vec<u8>) -> StreamNode {
        let dict = DictNode::new();
        for (k, v) in dict_entries {
            dict.insert(k.to_vec(), v.clone());
        }
        StreamNode::new(dict, Bytes::from(body))
    }

    #[test]
    fn parses_two_objects_from_a_stream() {
        let pairs_data = b"10 0 11 3";
        let objects_data = b"42 /Test";
        let mut combined = Vec::new();
        combined.extend_from_slice(pairs_data);
        combined.push(b' ');
        combined.extend_from_slice(objects_data);

        let stream = build_stream(
            &[
                (b"Type", PdfValue::Name(b"ObjStm".to_vec())),
                (b"N", PdfValue::Number(crate::value::PdfNumber::integer(2))),
                (b"First", PdfValue::Number(crate::value::PdfNumber::integer(9))),
            ],
            combined,
        );

        let objects = parse_object_stream(&stream, &registry()).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects.get(&10).unwrap().as_i64(), Some(42));
        assert_eq!(objects.get(&11).unwrap().as_name(), Some(&b"Test"[..]));
    }

    #[test]
    fn missing_type_is_tolerated() {
        let stream = build_stream(
            &[
                (b"N", PdfValue::Number(crate::value::PdfNumber::integer(1))),
                (b"First", PdfValue::Number(crate::value::PdfNumber::integer(5))),
            ],
            b"1 0 42".to_vec(),
        );
        assert!(parse_object_stream(&stream, &registry()).is_ok());
    }

    #[test]
    fn missing_n_fails() {
        let stream = build_stream(
            &[
                (b"Type", PdfValue::Name(b"ObjStm".to_vec())),
                (b"First", PdfValue::Number(crate::value::PdfNumber::integer(5))),
            ],
            b"1 0 42".to_vec(),
        );
        assert!(parse_object_stream(&stream, &registry()).is_err());
    }

    #[test]
    fn missing_first_fails() {
        let stream = build_stream(
            &[
                (b"Type", PdfValue::Name(b"ObjStm".to_vec())),
                (b"N", PdfValue::Number(crate::value::PdfNumber::integer(1))),
            ],
            b"1 0 42".to_vec(),
        );
        assert!(parse_object_stream(&stream, &registry()).is_err());
    }

    #[test]
    fn negative_n_fails() {
        let stream = build_stream(
            &[
                (b"Type", PdfValue::Name(b"ObjStm".to_vec())),
                (b"N", PdfValue::Number(crate::value::PdfNumber::integer(-1))),
                (b"First", PdfValue::Number(crate::value::PdfNumber::integer(5))),
            ],
            b"1 0 42".to_vec(),
        );
        assert!(parse_object_stream(&stream, &registry()).is_err());
    }

    #[test]
    fn truncated_data_fails() {
        let stream = build_stream(
            &[
                (b"Type", PdfValue::Name(b"ObjStm".to_vec())),
                (b"N", PdfValue::Number(crate::value::PdfNumber::integer(1))),
                (b"First", PdfValue::Number(crate::value::PdfNumber::integer(100))),
            ],
            b"1 0 42".to_vec(),
        );
        assert!(parse_object_stream(&stream, &registry()).is_err());
    }
}
