//! Stream decoder implementations for PDF filters, and the registry that
//! dispatches `/Filter` names to them.
//!
//! - FlateDecode (zlib/deflate) - most common
//! - ASCIIHexDecode - hexadecimal encoding
//! - ASCII85Decode - base85 encoding
//! - LZWDecode - LZW compression
//! - RunLengthDecode - run-length encoding
//!
//! `/DCTDecode`, `/CCITTFaxDecode`, and `/JBIG2Decode` are external image
//! codecs, not object-graph concerns, and are intentionally absent from the
//! default registry; a caller that needs them registers its own decoder.
//!
//! Decoders are looked up by name through a [`FilterRegistry`] rather than a
//! hardcoded match, so callers can register additional filters without
//! touching this module.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii85::Ascii85Decoder;
pub use ascii_hex::AsciiHexDecoder;
pub use flate::FlateDecoder;
pub use lzw::LzwDecoder;
pub use predictor::{DecodeParams, PngPredictor, decode_predictor};
pub use runlength::RunLengthDecoder;

/// Default decompression-bomb protection: compressed:decompressed ratio.
const DEFAULT_MAX_DECOMPRESSION_RATIO: u32 = 100;
/// Default decompression-bomb protection: absolute decompressed size.
const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// A single PDF stream filter stage.
pub trait StreamDecoder {
    /// Decode `input`, the still-encoded bytes of one filter stage.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// The `/Filter` name this decoder answers to, e.g. `"FlateDecode"`.
    fn name(&self) -> &str;
}

/// A name-to-decoder lookup table.
///
/// The write path never needs this (emission writes bytes as given), but a
/// round-trip caller that re-encodes on write would register an encoder
/// counterpart the same way.
pub struct FilterRegistry {
    decoders: HashMap<String, Box<dyn StreamDecoder>>,
}

impl FilterRegistry {
    /// An empty registry with no filters known.
    pub fn new() -> Self {
        FilterRegistry { decoders: HashMap::new() }
    }

    /// Register a decoder under its own [`StreamDecoder::name`].
    pub fn register(&mut self, decoder: Box<dyn StreamDecoder>) {
        self.decoders.insert(decoder.name().to_string(), decoder);
    }

    /// Look up the decoder for a `/Filter` name.
    pub fn get(&self, name: &str) -> Option<&dyn StreamDecoder> {
        self.decoders.get(name).map(|d| d.as_ref())
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry populated with every filter this crate implements natively.
pub fn default_registry() -> FilterRegistry {
    let mut registry = FilterRegistry::new();
    registry.register(Box::new(FlateDecoder));
    registry.register(Box::new(AsciiHexDecoder));
    registry.register(Box::new(Ascii85Decoder));
    registry.register(Box::new(LzwDecoder));
    registry.register(Box::new(RunLengthDecoder));
    registry
}

/// Decode stream data through a `/Filter` pipeline, looking each stage up
/// in `registry`, then apply a PNG/TIFF predictor if `params` names one.
///
/// `options`, when given, overrides the decompression-bomb limits checked
/// after every filter stage.
pub fn decode_stream_with_options(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    options: Option<&ParserOptions>,
    registry: &FilterRegistry,
) -> Result<Vec<u8>> {
    let max_ratio = options.map(|o| o.max_decompression_ratio).unwrap_or(DEFAULT_MAX_DECOMPRESSION_RATIO);
    let max_size = options.map(|o| o.max_decompressed_size).unwrap_or(DEFAULT_MAX_DECOMPRESSED_SIZE);
    let compressed_size = data.len().max(1);
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder = registry.get(filter_name).ok_or_else(|| Error::UnknownFilter(filter_name.clone()))?;
        current = decoder.decode(&current)?;

        if max_ratio > 0 {
            let ratio = current.len() as u64 / compressed_size as u64;
            if ratio > max_ratio as u64 {
                return Err(Error::StreamDecodeError {
                    filter: filter_name.clone(),
                    position: current.len(),
                    reason: format!(
                        "decompression ratio {}:1 exceeds limit {}:1 ({} -> {} bytes)",
                        ratio,
                        max_ratio,
                        compressed_size,
                        current.len()
                    ),
                });
            }
        }
        if max_size > 0 && current.len() > max_size {
            return Err(Error::StreamDecodeError {
                filter: filter_name.clone(),
                position: current.len(),
                reason: format!("decompressed size {} bytes exceeds limit of {} bytes", current.len(), max_size),
            });
        }
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}

/// Decode a filter pipeline with decode parameters but no bomb-protection
/// override (the defaults apply).
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    registry: &FilterRegistry,
) -> Result<Vec<u8>> {
    decode_stream_with_options(data, filters, params, None, registry)
}

/// Decode a bare filter pipeline with no predictor and default limits.
pub fn decode_stream(data: &[u8], filters: &[String], registry: &FilterRegistry) -> Result<Vec<u8>> {
    decode_stream_with_params(data, filters, None, registry)
}
