//! Predictor reversal for PDF stream decoding.
//!
//! FlateDecode and LZWDecode streams may carry a Predictor entry in their
//! DecodeParms: 2 is the TIFF horizontal differencing predictor, 10-15 are
//! the PNG row filters. Cross-reference streams very commonly use PNG Up
//! (12) over their fixed-width binary rows.

use crate::error::{Error, Result};

/// Decode parameters for stream decoders.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample (default 1)
    pub colors: usize,
    /// Bits per component (default 8)
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of pixel data per row (without any predictor tag byte).
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component + 7) / 8
    }

    /// Bytes per complete pixel, the distance used for "left" neighbors.
    fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component) / 8).max(1)
    }
}

/// Reverse the predictor encoding described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        _ => Err(Error::Decode(format!("Unsupported predictor: {}", params.predictor))),
    }
}

/// TIFF Predictor 2: each sample is stored as the difference from its left
/// neighbor within the row.
fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();

    if row_len == 0 || data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "Predictor data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }

    let mut output = Vec::with_capacity(data.len());
    for chunk in data.chunks(row_len) {
        let start = output.len();
        output.extend_from_slice(chunk);
        for i in bpp..row_len {
            output[start + i] = output[start + i].wrapping_add(output[start + i - bpp]);
        }
    }

    Ok(output)
}

/// PNG predictors 10-15: every row starts with a filter tag byte followed by
/// the filtered row bytes. The tag decides the filter regardless of the
/// declared predictor value (15 explicitly allows mixing).
fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let stride = row_len + 1;
    let bpp = params.bytes_per_pixel();

    if row_len == 0 || data.len() % stride != 0 {
        return Err(Error::Decode(format!(
            "Predictor data length {} is not a multiple of row size {}",
            data.len(),
            stride
        )));
    }

    let mut output = Vec::with_capacity((data.len() / stride) * row_len);
    let mut prev = vec![0u8; row_len];

    for chunk in data.chunks(stride) {
        let tag = chunk[0];
        let mut row = chunk[1..].to_vec();

        match tag {
            0 => {},
            1 => {
                // Sub: add left neighbor
                for i in bpp..row_len {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            },
            2 => {
                // Up: add byte above
                for i in 0..row_len {
                    row[i] = row[i].wrapping_add(prev[i]);
                }
            },
            3 => {
                // Average of left and above
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                    let up = prev[i] as u16;
                    row[i] = row[i].wrapping_add(((left + up) / 2) as u8);
                }
            },
            4 => {
                // Paeth
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] as i16 } else { 0 };
                    let up = prev[i] as i16;
                    let up_left = if i >= bpp { prev[i - bpp] as i16 } else { 0 };
                    row[i] = row[i].wrapping_add(paeth_predictor(left, up, up_left) as u8);
                }
            },
            _ => {
                return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag)));
            },
        }

        output.extend_from_slice(&row);
        prev = row;
    }

    Ok(output)
}

/// Paeth predictor function from the PNG specification.
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
