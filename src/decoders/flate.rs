//! FlateDecode (zlib/deflate) implementation.
//!
//! This is the most common PDF compression filter, used in ~90% of PDFs.
//! Uses the flate2 crate for zlib decompression.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
///
/// Decompresses data using the zlib/deflate algorithm. Falls back through a
/// small set of recovery strategies for streams with corrupt zlib headers,
/// since real-world PDFs frequently carry slightly malformed `/FlateDecode`
/// streams that every other reader tolerates.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(input);
        let mut output = Vec::new();

        match decoder.read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(e) => {
                if !output.is_empty() {
                    log::warn!("FlateDecode partial recovery: extracted {} bytes before corruption: {}", output.len(), e);
                    return Ok(output);
                }

                log::info!("Zlib decode failed, trying raw deflate");
                output.clear();
                let mut deflate_decoder = DeflateDecoder::new(input);

                match deflate_decoder.read_to_end(&mut output) {
                    Ok(_) => {
                        log::info!("Raw deflate recovery succeeded: {} bytes", output.len());
                        Ok(output)
                    },
                    Err(deflate_err) => {
                        if !output.is_empty() {
                            log::warn!("Raw deflate partial recovery: extracted {} bytes before error", output.len());
                            return Ok(output);
                        }

                        if input.len() > 2 {
                            log::info!("Trying deflate after skipping potential corrupt zlib header");
                            output.clear();
                            let mut deflate_decoder = DeflateDecoder::new(&input[2..]);

                            match deflate_decoder.read_to_end(&mut output) {
                                Ok(_) => {
                                    log::info!("Deflate with header skip succeeded: {} bytes", output.len());
                                    return Ok(output);
                                },
                                Err(_) => {
                                    if !output.is_empty() {
                                        log::warn!("Deflate with header skip partial recovery: {} bytes", output.len());
                                        return Ok(output);
                                    }
                                },
                            }
                        }

                        if input.len() >= 2 {
                            let first_byte = input[0];
                            let compression_method = first_byte & 0x0F;
                            if compression_method != 8 {
                                log::info!(
                                    "Detected invalid compression method {} in header byte 0x{:02x}, trying with corrected header",
                                    compression_method,
                                    first_byte
                                );
                                let mut corrected = input.to_vec();
                                corrected[0] = (first_byte & 0xF0) | 0x08;

                                output.clear();
                                let mut decoder = ZlibDecoder::new(&corrected[..]);
                                match decoder.read_to_end(&mut output) {
                                    Ok(_) if !output.is_empty() => {
                                        log::info!("Header correction recovery succeeded: {} bytes", output.len());
                                        return Ok(output);
                                    },
                                    Err(_) if !output.is_empty() => {
                                        log::warn!("Header correction partial recovery: {} bytes", output.len());
                                        return Ok(output);
                                    },
                                    _ => {
                                        log::info!("Header correction failed");
                                    },
                                }
                            }
                        }

                        log::info!("Trying brute-force scan for valid deflate data");
                        let max_offset = std::cmp::min(20, input.len());
                        for offset in 0..max_offset {
                            if offset == 0 || offset == 2 {
                                continue;
                            }

                            output.clear();
                            let mut deflate_decoder = DeflateDecoder::new(&input[offset..]);

                            let attempt_ok = match deflate_decoder.read_to_end(&mut output) {
                                Ok(_) if !output.is_empty() => true,
                                Err(_) if !output.is_empty() => false,
                                _ => continue,
                            };

                            let decoded_str = String::from_utf8_lossy(&output);
                            let has_pdf_operators = decoded_str.contains("BT")
                                || decoded_str.contains("ET")
                                || decoded_str.contains("Tj")
                                || decoded_str.contains("TJ")
                                || decoded_str.contains("Tm")
                                || decoded_str.contains("Td");

                            if !has_pdf_operators {
                                log::info!("Brute-force at offset {} produced {} bytes but no valid PDF operators - trying next offset", offset, output.len());
                                continue;
                            }

                            if attempt_ok {
                                log::info!("Brute-force deflate recovery succeeded at offset {}: {} bytes (validated PDF content)", offset, output.len());
                            } else {
                                log::warn!("Brute-force partial recovery at offset {}: {} bytes (validated PDF content)", offset, output.len());
                            }
                            return Ok(output);
                        }

                        log::error!("All FlateDecode recovery strategies failed. Zlib: {}, Deflate: {}", e, deflate_err);

                        Err(Error::StreamDecodeError {
                            filter: "FlateDecode".to_string(),
                            position: 0,
                            reason: format!(
                                "decompression failed after all recovery strategies: zlib error: {}, deflate error: {}, compressed size: {} bytes",
                                e,
                                deflate_err,
                                input.len()
                            ),
                        })
                    },
                }
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn decode_simple() {
        let decoder = FlateDecoder;
        let original = b"Hello, FlateDecode!";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decoder.decode(&compressed).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_empty() {
        let decoder = FlateDecoder;
        let original = b"";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decoder.decode(&compressed).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_large_data() {
        let decoder = FlateDecoder;
        let original = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(1000);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decoder.decode(&compressed).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_invalid_data_fails() {
        let decoder = FlateDecoder;
        let invalid = b"This is not zlib compressed data";
        let result = decoder.decode(invalid);
        assert!(result.is_err());
        match result.unwrap_err() {
            Error::StreamDecodeError { filter, .. } => assert_eq!(filter, "FlateDecode"),
            other => panic!("expected StreamDecodeError, got {:?}", other),
        }
    }

    #[test]
    fn decoder_name() {
        assert_eq!(FlateDecoder.name(), "FlateDecode");
    }
}
