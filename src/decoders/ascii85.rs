//! ASCII85Decode (Base85) implementation.
//!
//! Decodes ASCII85/Base85 encoded data. Four bytes are represented as five
//! ASCII characters in the range `!` to `u`; `z` is shorthand for four zero
//! bytes.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCII85Decode filter implementation.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut acc: u32 = 0;
        let mut count = 0;

        let overflow = |pos: usize, what: &str| Error::StreamDecodeError {
            filter: "ASCII85Decode".to_string(),
            position: pos,
            reason: format!("overflow in {}", what),
        };

        for (pos, &byte) in input.iter().enumerate() {
            match byte {
                b'~' => break,
                b'z' => {
                    if count != 0 {
                        return Err(Error::StreamDecodeError {
                            filter: "ASCII85Decode".to_string(),
                            position: pos,
                            reason: "'z' must not appear in the middle of a group".to_string(),
                        });
                    }
                    output.extend_from_slice(&[0, 0, 0, 0]);
                },
                b'!'..=b'u' => {
                    acc = acc
                        .checked_mul(85)
                        .and_then(|v| v.checked_add((byte - b'!') as u32))
                        .ok_or_else(|| overflow(pos, "decoding"))?;
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&acc.to_be_bytes());
                        acc = 0;
                        count = 0;
                    }
                },
                _ if byte.is_ascii_whitespace() => {},
                _ => {
                    return Err(Error::StreamDecodeError {
                        filter: "ASCII85Decode".to_string(),
                        position: pos,
                        reason: format!("invalid character '{}'", byte as char),
                    });
                },
            }
        }

        if count > 0 {
            if count == 1 {
                return Err(Error::StreamDecodeError {
                    filter: "ASCII85Decode".to_string(),
                    position: input.len(),
                    reason: "incomplete group (need at least 2 characters)".to_string(),
                });
            }

            for _ in count..5 {
                acc = acc.checked_mul(85).and_then(|v| v.checked_add(84)).ok_or_else(|| overflow(input.len(), "padding"))?;
            }

            let bytes = acc.to_be_bytes();
            output.extend_from_slice(&bytes[..count - 1]);
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_simple() {
        let decoder = Ascii85Decoder;
        assert_eq!(decoder.decode(b"<+U,m").unwrap(), b"Test");
    }

    #[test]
    fn decode_z_special_case() {
        let decoder = Ascii85Decoder;
        assert_eq!(decoder.decode(b"z").unwrap(), b"\x00\x00\x00\x00");
    }

    #[test]
    fn decode_multiple_z() {
        let decoder = Ascii85Decoder;
        assert_eq!(decoder.decode(b"zz").unwrap(), b"\x00\x00\x00\x00\x00\x00\x00\x00");
    }

    #[test]
    fn decode_with_whitespace() {
        let decoder = Ascii85Decoder;
        assert_eq!(decoder.decode(b"<+U ,m").unwrap(), b"Test");
    }

    #[test]
    fn decode_with_end_marker() {
        let decoder = Ascii85Decoder;
        assert_eq!(decoder.decode(b"<+U,m~>").unwrap(), b"Test");
    }

    #[test]
    fn decode_empty() {
        let decoder = Ascii85Decoder;
        assert_eq!(decoder.decode(b"").unwrap(), b"");
    }

    #[test]
    fn decode_padding_produces_output() {
        let decoder = Ascii85Decoder;
        let output = decoder.decode(b"!!").unwrap();
        assert!(!output.is_empty());
    }

    #[test]
    fn decode_invalid_character_fails() {
        let decoder = Ascii85Decoder;
        assert!(decoder.decode(b"Hello\x00").is_err());
    }

    #[test]
    fn decode_z_in_middle_fails() {
        let decoder = Ascii85Decoder;
        assert!(decoder.decode(b"!z").is_err());
    }

    #[test]
    fn decode_single_char_fails() {
        let decoder = Ascii85Decoder;
        assert!(decoder.decode(b"!").is_err());
    }

    #[test]
    fn decoder_name() {
        assert_eq!(Ascii85Decoder.name(), "ASCII85Decode");
    }
}
