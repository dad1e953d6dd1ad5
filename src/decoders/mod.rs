//! Stream decoder implementations for PDF filters.
//!
//! Cross-reference streams and compressed object containers are almost
//! always FlateDecode, optionally with a PNG predictor; the incremental
//! writer emits ASCIIHexDecode. Those are the filters carried here:
//! - FlateDecode (zlib/deflate)
//! - ASCIIHexDecode
//! - PNG/TIFF predictors via DecodeParms
//!
//! Decoders can be chained together in a filter pipeline. Any other filter
//! name fails with `Error::UnsupportedFilter`, which poisons the affected
//! object only, never the whole document.

use crate::error::Error;
use crate::error::Result;

mod ascii_hex;
mod flate;
mod predictor;

pub use ascii_hex::AsciiHexDecoder;
pub use flate::FlateDecoder;
pub use predictor::{DecodeParams, decode_predictor};

/// Trait for PDF stream decoders.
///
/// Each decoder implements a specific PDF filter algorithm.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode stream data using a filter pipeline.
///
/// PDF streams can have multiple filters applied in sequence; each filter in
/// `filters` is applied in order.
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    decode_stream_with_params(data, filters, None)
}

/// Decode stream data using a filter pipeline with optional decode parameters.
///
/// Predictor parameters (from DecodeParms) are applied after the main
/// filters.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            "ASCIIHexDecode" | "AHx" => Box::new(AsciiHexDecoder),
            _ => return Err(Error::UnsupportedFilter(filter_name.clone())),
        };

        current = decoder.decode(&current)?;
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}
