//! FlateDecode (zlib/deflate) implementation using flate2.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
///
/// Signing tools occasionally emit streams with a damaged zlib trailer; any
/// bytes recovered before the error are kept, and a raw deflate pass is
/// attempted when the zlib header itself is unusable.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) if !output.is_empty() => {
                log::warn!("FlateDecode partial recovery: {} bytes before error: {}", output.len(), e);
                return Ok(output);
            },
            Err(e) => e,
        };

        log::debug!("Zlib decode failed ({}), trying raw deflate", zlib_err);
        output.clear();
        match DeflateDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(_) if !output.is_empty() => Ok(output),
            Err(e) => Err(Error::Decode(format!("FlateDecode failed: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}
