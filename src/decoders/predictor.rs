//! PNG and TIFF predictor implementations for `/DecodeParms`.
//!
//! PDF streams can apply a predictor to improve compression ratios: pixel
//! values are stored as differences from neighboring pixels, which this
//! module reverses during decode.

use crate::error::{Error, Result};

/// PNG predictor algorithms, numbered per `/Predictor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngPredictor {
    /// No prediction (predictor 10).
    None = 10,
    /// Each byte is the difference from the byte to its left (predictor 11).
    Sub = 11,
    /// Each byte is the difference from the byte above (predictor 12).
    Up = 12,
    /// Each byte is the difference from the average of left and above (predictor 13).
    Average = 13,
    /// Uses the Paeth predictor function (predictor 14).
    Paeth = 14,
    /// PNG allows a different predictor per row, chosen by a per-row tag byte (predictor 15).
    Optimum = 15,
}

/// `/DecodeParms` fields relevant to predictor decoding.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm: 1 = none, 2 = TIFF, 10-15 = PNG.
    pub predictor: i64,
    /// Number of columns (samples per row).
    pub columns: usize,
    /// Color components per sample.
    pub colors: usize,
    /// Bits per component.
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        DecodeParams {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes per encoded row, including the PNG predictor tag byte when applicable.
    pub fn bytes_per_row(&self) -> usize {
        let pixel_bytes = self.pixel_bytes_per_row();
        if self.predictor >= 10 { pixel_bytes + 1 } else { pixel_bytes }
    }

    /// Bytes of actual pixel data per row, excluding any predictor tag byte.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }
}

fn decode_error(reason: impl Into<String>) -> Error {
    Error::StreamDecodeError {
        filter: "Predictor".to_string(),
        position: 0,
        reason: reason.into(),
    }
}

/// Reverse a predictor transform, dispatching on `/Predictor`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(decode_error(format!("unsupported predictor {}", other))),
    }
}

fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let bytes_per_row = params.pixel_bytes_per_row();
    let colors = params.colors;

    if !data.len().is_multiple_of(bytes_per_row) {
        return Err(decode_error(format!("data length {} is not a multiple of row size {}", data.len(), bytes_per_row)));
    }

    let mut output = Vec::with_capacity(data.len());
    for row_data in data.chunks(bytes_per_row) {
        output.extend_from_slice(&row_data[..colors]);
        for i in colors..row_data.len() {
            let left = output[output.len() - colors];
            output.push(row_data[i].wrapping_add(left));
        }
    }

    Ok(output)
}

fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let bytes_per_row = params.bytes_per_row();
    let pixel_bytes = params.pixel_bytes_per_row();

    if !data.len().is_multiple_of(bytes_per_row) {
        return Err(decode_error(format!("data length {} is not a multiple of row size {}", data.len(), bytes_per_row)));
    }

    let row_count = data.len() / bytes_per_row;
    let mut output = Vec::with_capacity(row_count * pixel_bytes);
    let bpp = params.colors;

    for row_idx in 0..row_count {
        let row_start = row_idx * bytes_per_row;
        let row_data = &data[row_start..row_start + bytes_per_row];

        let predictor_tag = if params.predictor == 15 { row_data[0] } else { (params.predictor - 10) as u8 };
        let encoded_pixels = &row_data[1..];

        match predictor_tag {
            0 => output.extend_from_slice(encoded_pixels),
            1 => decode_png_sub(encoded_pixels, &mut output, bpp),
            2 => decode_png_up(encoded_pixels, &mut output, row_idx, pixel_bytes),
            3 => decode_png_average(encoded_pixels, &mut output, row_idx, pixel_bytes, bpp),
            4 => decode_png_paeth(encoded_pixels, &mut output, row_idx, pixel_bytes, bpp),
            other => return Err(decode_error(format!("invalid PNG predictor tag {}", other))),
        }
    }

    Ok(output)
}

fn decode_png_sub(encoded: &[u8], output: &mut Vec<u8>, bpp: usize) {
    let start_pos = output.len();
    for (i, &byte) in encoded.iter().enumerate() {
        let left = if i >= bpp { output[start_pos + i - bpp] } else { 0 };
        output.push(byte.wrapping_add(left));
    }
}

fn decode_png_up(encoded: &[u8], output: &mut Vec<u8>, row_idx: usize, pixel_bytes: usize) {
    for (i, &byte) in encoded.iter().enumerate() {
        let up = if row_idx > 0 { output[(row_idx - 1) * pixel_bytes + i] } else { 0 };
        output.push(byte.wrapping_add(up));
    }
}

fn decode_png_average(encoded: &[u8], output: &mut Vec<u8>, row_idx: usize, pixel_bytes: usize, bpp: usize) {
    let start_pos = output.len();
    for (i, &byte) in encoded.iter().enumerate() {
        let left = if i >= bpp { output[start_pos + i - bpp] as u16 } else { 0 };
        let up = if row_idx > 0 { output[(row_idx - 1) * pixel_bytes + i] as u16 } else { 0 };
        let avg = ((left + up) / 2) as u8;
        output.push(byte.wrapping_add(avg));
    }
}

fn decode_png_paeth(encoded: &[u8], output: &mut Vec<u8>, row_idx: usize, pixel_bytes: usize, bpp: usize) {
    let start_pos = output.len();
    for (i, &byte) in encoded.iter().enumerate() {
        let left = if i >= bpp { output[start_pos + i - bpp] as i16 } else { 0 };
        let up = if row_idx > 0 { output[(row_idx - 1) * pixel_bytes + i] as i16 } else { 0 };
        let up_left = if row_idx > 0 && i >= bpp { output[(row_idx - 1) * pixel_bytes + i - bpp] as i16 } else { 0 };
        let paeth = paeth_predictor(left, up, up_left) as u8;
        output.push(byte.wrapping_add(paeth));
    }
}

fn paeth_predictor(a: i16, b: i16, c: i16) -> i16 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
