//! LZWDecode implementation for PDF (ISO 32000-1:2008, Section 7.4.4).
//!
//! PDF's LZW variant: MSB-first bit ordering, 9-bit starting code size,
//! `EarlyChange=1` (the code size grows one code earlier than GIF/TIFF),
//! clear code 256, EOD code 257, first available code 258.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// LZWDecode filter implementation.
pub struct LzwDecoder;

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        match decode_lzw_weezl(input) {
            Ok(data) => Ok(data),
            Err(_) => decode_lzw_custom(input),
        }
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}

/// Decode using the `weezl` crate, a well-tested general LZW implementation.
fn decode_lzw_weezl(input: &[u8]) -> Result<Vec<u8>> {
    use weezl::{BitOrder, decode::Decoder as WeezlDecoder};

    let mut decoder = WeezlDecoder::new(BitOrder::Msb, 8);
    decoder.decode(input).map_err(|e| Error::StreamDecodeError {
        filter: "LZWDecode".to_string(),
        position: 0,
        reason: format!("{:?}", e),
    })
}

/// Fallback LZW decoder following the PDF spec's `EarlyChange=1` behavior
/// exactly, for inputs `weezl` (tuned for GIF/TIFF defaults) rejects.
fn decode_lzw_custom(input: &[u8]) -> Result<Vec<u8>> {
    const CLEAR_CODE: u16 = 256;
    const EOD_CODE: u16 = 257;
    const FIRST_CODE: u16 = 258;
    const MAX_CODE_BITS: u8 = 12;

    let bad_code = |code: u16, next_code: u16, code_bits: u8| Error::StreamDecodeError {
        filter: "LZWDecode".to_string(),
        position: 0,
        reason: format!("invalid code {} (next_code={}, code_bits={})", code, next_code, code_bits),
    };

    let mut output = Vec::new();
    let mut table = init_lzw_table();
    let mut code_bits = 9;
    let mut next_code = FIRST_CODE;
    let mut bit_reader = BitReader::new(input);
    let mut prev_code: Option<u16> = None;

    loop {
        if code_bits < MAX_CODE_BITS && next_code == (1 << code_bits) - 1 {
            code_bits += 1;
        }

        let code = match bit_reader.read_bits(code_bits) {
            Some(c) => c as u16,
            None => break,
        };

        if code == EOD_CODE {
            break;
        }

        if code == CLEAR_CODE {
            table = init_lzw_table();
            code_bits = 9;
            next_code = FIRST_CODE;
            prev_code = None;
            continue;
        }

        let string = if code < next_code {
            table.get(&code).cloned().ok_or_else(|| bad_code(code, next_code, code_bits))?
        } else if code == next_code && prev_code.is_some() {
            let prev_string = table.get(&prev_code.unwrap()).unwrap();
            let mut s = prev_string.clone();
            s.push(prev_string[0]);
            s
        } else {
            return Err(bad_code(code, next_code, code_bits));
        };

        output.extend_from_slice(&string);

        if let Some(prev) = prev_code {
            if next_code < 4096 {
                let prev_string = table.get(&prev).unwrap();
                let mut new_string = prev_string.clone();
                new_string.push(string[0]);
                table.insert(next_code, new_string);
                next_code += 1;
            }
        }

        prev_code = Some(code);
    }

    Ok(output)
}

fn init_lzw_table() -> std::collections::HashMap<u16, Vec<u8>> {
    (0..=255u16).map(|i| (i, vec![i as u8])).collect()
}

/// MSB-first bit reader over a byte slice.
struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, byte_pos: 0, bit_pos: 0 }
    }

    fn read_bits(&mut self, n: u8) -> Option<u32> {
        if n == 0 || n > 16 {
            return None;
        }

        let mut result = 0u32;
        let mut remaining = n;

        while remaining > 0 {
            if self.byte_pos >= self.data.len() {
                return None;
            }

            let bits_in_current_byte = 8 - self.bit_pos;
            let bits_to_read = remaining.min(bits_in_current_byte);

            let byte = self.data[self.byte_pos];
            let shift_amount = bits_in_current_byte - bits_to_read;
            let mask = if bits_to_read == 8 { 0xFF } else { ((1u8 << bits_to_read) - 1) << shift_amount };
            let bits = (byte & mask) >> shift_amount;

            result = (result << bits_to_read) | (bits as u32);

            self.bit_pos += bits_to_read;
            if self.bit_pos >= 8 {
                self.byte_pos += 1;
                self.bit_pos = 0;
            }

            remaining -= bits_to_read;
        }

        Some(result)
    }
}
