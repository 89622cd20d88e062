//! PDF object parser: turns a lexer token stream into `PdfValue` trees.
//!
//! This sits just above [`crate::lexer`] in the read path. It owns the
//! grammar for composing tokens into arrays, dictionaries, and streams, and
//! for recognizing the `N G R` indirect-reference lookahead pattern, but
//! leaves byte-level tokenization itself to the lexer.

use bytes::Bytes;
use nom::IResult;

use crate::error::{Error, Result};
use crate::lexer::{self, Token};
use crate::value::{ArrayNode, DictNode, PdfNumber, PdfValue, Reference, StreamNode, StringKind};

/// Decode the escape sequences inside a literal string's raw content
/// (the bytes between the outer, already-stripped parentheses).
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        if i >= raw.len() {
            break;
        }
        match raw[i] {
            b'n' => {
                out.push(b'\n');
                i += 1;
            },
            b'r' => {
                out.push(b'\r');
                i += 1;
            },
            b't' => {
                out.push(b'\t');
                i += 1;
            },
            b'b' => {
                out.push(0x08);
                i += 1;
            },
            b'f' => {
                out.push(0x0C);
                i += 1;
            },
            b'(' => {
                out.push(b'(');
                i += 1;
            },
            b')' => {
                out.push(b')');
                i += 1;
            },
            b'\\' => {
                out.push(b'\\');
                i += 1;
            },
            b'\r' => {
                // Backslash-newline is a line continuation: it vanishes entirely.
                i += 1;
                if i < raw.len() && raw[i] == b'\n' {
                    i += 1;
                }
            },
            b'\n' => {
                i += 1;
            },
            d if d.is_ascii_digit() => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 3 && i < raw.len() && raw[i].is_ascii_digit() {
                    value = value * 8 + (raw[i] - b'0') as u32;
                    i += 1;
                    digits += 1;
                }
                out.push((value & 0xFF) as u8);
            },
            other => {
                // An unrecognized escape drops the backslash, per spec.
                out.push(other);
                i += 1;
            },
        }
    }
    out
}

/// Decode a hex string's raw content: whitespace is ignored, a trailing odd
/// digit is padded with an implicit `0`.
pub fn decode_hex_string(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw.iter().copied().filter(|b| b.is_ascii_hexdigit()).collect();
    let mut out = Vec::with_capacity((digits.len() + 1) / 2);
    let mut chunks = digits.chunks(2);
    for chunk in &mut chunks {
        let hi = hex_nibble(chunk[0]);
        let lo = if chunk.len() == 2 { hex_nibble(chunk[1]) } else { 0 };
        out.push((hi << 4) | lo);
    }
    out
}

fn hex_nibble(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

/// Parse one complete PDF value (scalar, composite, or stream) from the
/// front of `input`.
pub fn parse_value(input: &[u8]) -> IResult<&[u8], PdfValue> {
    let (rest, tok) = lexer::token(input)?;
    match tok {
        Token::Null => Ok((rest, PdfValue::Null)),
        Token::True => Ok((rest, PdfValue::Boolean(true))),
        Token::False => Ok((rest, PdfValue::Boolean(false))),
        Token::Integer(n) => Ok(parse_integer_or_reference(n, rest)),
        Token::Real(raw) => {
            let text = std::str::from_utf8(raw).unwrap_or("0");
            let number = PdfNumber::parse(text).unwrap_or_else(|| PdfNumber::integer(0));
            Ok((rest, PdfValue::Number(number)))
        },
        Token::Name(name) => Ok((rest, PdfValue::Name(name.into_bytes()))),
        Token::LiteralString(raw) => {
            Ok((rest, PdfValue::String(decode_literal_string_escapes(raw), StringKind::Literal)))
        },
        Token::HexString(raw) => Ok((rest, PdfValue::String(decode_hex_string(raw), StringKind::Hex))),
        Token::ArrayStart => Ok(parse_array(rest)),
        Token::DictStart => Ok(parse_dict_or_stream(rest)),
        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Alt))),
    }
}

/// Resolve the `Integer Integer R` lookahead that distinguishes an indirect
/// reference from a bare number. `rest` is only advanced past the
/// generation number and `R` keyword when the full pattern matches;
/// otherwise the lookahead tokens are discarded and only `n` itself was
/// ever consumed.
fn parse_integer_or_reference(n: i64, rest: &[u8]) -> (&[u8], PdfValue) {
    if n >= 0 {
        if let Ok((rest2, Token::Integer(gen))) = lexer::token(rest) {
            if (0..=u16::MAX as i64).contains(&gen) {
                if let Ok((rest3, Token::R)) = lexer::token(rest2) {
                    return (rest3, PdfValue::Indirect(Reference::new(n as u32, gen as u16)));
                }
            }
        }
    }
    (rest, PdfValue::Number(PdfNumber::integer(n)))
}

fn parse_array(mut input: &[u8]) -> (&[u8], PdfValue) {
    let array = ArrayNode::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = lexer::token(input) {
            return (rest, PdfValue::Array(array));
        }
        match parse_value(input) {
            Ok((rest, value)) => {
                array.push(value);
                input = rest;
            },
            // Truncated array: tolerate and return what was gathered so far.
            Err(_) => return (input, PdfValue::Array(array)),
        }
    }
}

fn parse_dict_or_stream(mut input: &[u8]) -> (&[u8], PdfValue) {
    let dict = DictNode::new();
    loop {
        if let Ok((rest, Token::DictEnd)) = lexer::token(input) {
            input = rest;
            break;
        }
        let (after_key, key_tok) = match lexer::token(input) {
            Ok(v) => v,
            Err(_) => return (input, PdfValue::Dictionary(dict)),
        };
        let key = match key_tok {
            Token::Name(name) => name.into_bytes(),
            // A non-name where a key was expected: bail out leniently,
            // keeping whatever entries were already parsed.
            _ => return (after_key, PdfValue::Dictionary(dict)),
        };
        match parse_value(after_key) {
            Ok((after_value, value)) => {
                dict.insert(key, value);
                input = after_value;
            },
            Err(_) => return (after_key, PdfValue::Dictionary(dict)),
        }
    }

    match lexer::token(input) {
        Ok((rest, Token::StreamStart)) => parse_stream_body(rest, dict),
        _ => (input, PdfValue::Dictionary(dict)),
    }
}

/// Parse stream data immediately following a consumed `stream` keyword.
///
/// The `stream` keyword must be followed by CRLF or a bare LF before data
/// begins (ISO 32000-1 7.3.8.1); a bare CR is accepted leniently. Raw bytes
/// are read for exactly `/Length` when that value is present and in range;
/// otherwise this falls back to scanning for the literal `endstream`
/// marker, matching how malformed real-world PDFs are recovered.
fn parse_stream_body(input: &[u8], dict: DictNode) -> (&[u8], PdfValue) {
    let data_start = skip_stream_eol(input);

    let declared_length = dict.get(b"Length").and_then(|v| v.as_i64()).filter(|&n| n >= 0).map(|n| n as usize);

    let (raw, after) = match declared_length.filter(|&len| len <= data_start.len()) {
        Some(len) => (&data_start[..len], &data_start[len..]),
        None => match find_subslice(data_start, b"endstream") {
            Some(idx) => (&data_start[..idx], &data_start[idx..]),
            None => (data_start, &data_start[data_start.len()..]),
        },
    };

    let after = skip_stream_eol(after);
    let after = match lexer::token(after) {
        Ok((rest, Token::StreamEnd)) => rest,
        _ => after,
    };

    let stream = StreamNode::new(dict, Bytes::copy_from_slice(raw));
    (after, PdfValue::Stream(stream))
}

fn skip_stream_eol(input: &[u8]) -> &[u8] {
    if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.first() == Some(&b'\r') || input.first() == Some(&b'\n') {
        &input[1..]
    } else {
        input
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse a complete indirect object: `N G obj <value> endobj`. Used by the
/// object resolver to load uncompressed objects at their xref byte offset.
/// A missing `endobj` keyword is tolerated.
pub fn parse_indirect_object(input: &[u8]) -> Result<(Reference, PdfValue)> {
    let malformed = |reason: &str| Error::LexError {
        offset: 0,
        reason: reason.to_string(),
    };

    let (rest, num_tok) = lexer::token(input).map_err(|_| malformed("expected object number"))?;
    let obj_num = match num_tok {
        Token::Integer(n) if n >= 0 => n as u32,
        _ => return Err(malformed("expected object number")),
    };

    let (rest, gen_tok) = lexer::token(rest).map_err(|_| malformed("expected generation number"))?;
    let gen_num = match gen_tok {
        Token::Integer(n) if (0..=u16::MAX as i64).contains(&n) => n as u16,
        _ => return Err(malformed("expected generation number")),
    };

    let (rest, kw) = lexer::token(rest).map_err(|_| malformed("expected 'obj' keyword"))?;
    if kw != Token::ObjStart {
        return Err(malformed("expected 'obj' keyword"));
    }

    let (rest, value) = parse_value(rest).map_err(|_| malformed("failed to parse object body"))?;
    // `endobj` is consumed if present but its absence is not an error.
    let _ = lexer::token(rest);

    Ok((Reference::new(obj_num, gen_num), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_literal_string_escapes_handles_standard_escapes() {
        let decoded = decode_literal_string_escapes(b"Line1\\nLine2\\tEnd");
        assert_eq!(decoded, b"Line1\nLine2\tEnd");
    }

    #[test]
    fn decode_literal_string_escapes_handles_octal() {
        let decoded = decode_literal_string_escapes(b"\\101\\102\\103");
        assert_eq!(decoded, b"ABC");
    }

    #[test]
    fn decode_literal_string_escapes_elides_line_continuation() {
        let decoded = decode_literal_string_escapes(b"foo\\\nbar");
        assert_eq!(decoded, b"foobar");
    }

    #[test]
    fn decode_hex_string_pads_odd_digit() {
        assert_eq!(decode_hex_string(b"901FA"), vec![0x90, 0x1F, 0xA0]);
    }

    #[test]
    fn decode_hex_string_ignores_whitespace() {
        assert_eq!(decode_hex_string(b"48 65 6C 6C 6F"), b"Hello");
    }

    #[test]
    fn parse_value_null_true_false() {
        assert_eq!(parse_value(b"null").unwrap().1, PdfValue::Null);
        assert_eq!(parse_value(b"true").unwrap().1, PdfValue::Boolean(true));
        assert_eq!(parse_value(b"false").unwrap().1, PdfValue::Boolean(false));
    }

    #[test]
    fn parse_value_integer_stays_scalar_without_following_gen_r() {
        let (rest, value) = parse_value(b"42 /Next").unwrap();
        assert_eq!(value, PdfValue::Number(PdfNumber::integer(42)));
        assert_eq!(rest, b" /Next");
    }

    #[test]
    fn parse_value_recognizes_indirect_reference() {
        let (rest, value) = parse_value(b"12 0 R").unwrap();
        assert_eq!(value.as_reference(), Some(Reference::new(12, 0)));
        assert_eq!(rest, b"");
    }

    #[test]
    fn parse_dictionary_resolves_reference_value() {
        let (_, value) = parse_value(b"<< /Parent 12 0 R >>").unwrap();
        let dict = value.as_dict().unwrap();
        let parent = dict.get(b"Parent").unwrap();
        assert_eq!(parent.as_reference(), Some(Reference::new(12, 0)));
    }

    #[test]
    fn parse_array_of_numbers() {
        let (_, value) = parse_value(b"[1 2 3]").unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(1), Some(PdfValue::Number(PdfNumber::integer(2))));
    }

    #[test]
    fn parse_dictionary_preserves_key_order() {
        let (_, value) = parse_value(b"<< /B 1 /A 2 >>").unwrap();
        let dict = value.as_dict().unwrap();
        let keys: Vec<_> = dict.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"B".to_vec(), b"A".to_vec()]);
    }

    #[test]
    fn parse_stream_reads_declared_length() {
        let input = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let (_, value) = parse_value(input).unwrap();
        let stream = value.as_stream().unwrap();
        assert_eq!(stream.raw_bytes(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn parse_stream_falls_back_to_endstream_scan_on_bad_length() {
        let input = b"<< /Length 999 >>\nstream\nhello\nendstream";
        let (_, value) = parse_value(input).unwrap();
        let stream = value.as_stream().unwrap();
        assert_eq!(stream.raw_bytes(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn parse_indirect_object_round_trips_header() {
        let input = b"7 0 obj\n<< /Type /Catalog >>\nendobj";
        let (reference, value) = parse_indirect_object(input).unwrap();
        assert_eq!(reference, Reference::new(7, 0));
        assert_eq!(value.as_dict().unwrap().type_name(), Some(b"Catalog".to_vec()));
    }

    #[test]
    fn parse_indirect_object_tolerates_missing_endobj() {
        let input = b"3 0 obj\n42";
        let (reference, value) = parse_indirect_object(input).unwrap();
        assert_eq!(reference, Reference::new(3, 0));
        assert_eq!(value, PdfValue::Number(PdfNumber::integer(42)));
    }
}
