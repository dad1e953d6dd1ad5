//! FlateDecode (zlib/deflate) implementation.
//!
//! This is the most common PDF compression filter. Uses the flate2 crate
//! for zlib decompression, with fallbacks for streams whose zlib header is
//! damaged or absent.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => {
                // Truncated stream: keep whatever inflated cleanly
                if !output.is_empty() {
                    log::warn!(
                        "FlateDecode: stream truncated after {} decoded bytes: {}",
                        output.len(),
                        e
                    );
                    return Ok(output);
                }
                e
            },
        };

        // Some generators write raw deflate data without the zlib wrapper
        output.clear();
        if DeflateDecoder::new(input).read_to_end(&mut output).is_ok() {
            log::warn!("FlateDecode: stream had no zlib wrapper, decoded as raw deflate");
            return Ok(output);
        }

        // Or a corrupt two-byte header in front of valid deflate data
        if input.len() > 2 {
            output.clear();
            if DeflateDecoder::new(&input[2..]).read_to_end(&mut output).is_ok() {
                log::warn!("FlateDecode: skipped corrupt zlib header");
                return Ok(output);
            }
        }

        Err(Error::Decode(format!(
            "FlateDecode decompression failed ({} compressed bytes): {}",
            input.len(),
            zlib_err
        )))
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

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_flate_decode_simple() {
        let original = b"Hello, FlateDecode!";
        let decoded = FlateDecoder.decode(&zlib_compress(original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_flate_decode_large_data() {
        let original = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(1000);
        let decoded = FlateDecoder.decode(&zlib_compress(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        use flate2::write::DeflateEncoder;
        let original = b"raw deflate without zlib wrapper";
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = FlateDecoder.decode(&compressed).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        let result = FlateDecoder.decode(b"\xff\xfe\xfd\xfc not compressed");
        assert!(result.is_err());
    }
}
