//! Stream filters needed to read signature-bearing PDFs.
//!
//! Cross-reference streams, object streams and `/DSS` certificate / OCSP /
//! CRL streams are in practice always FlateDecode, optionally with a PNG
//! predictor on xref streams. Image filters never matter here and are
//! reported as unsupported.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser_config::ParserOptions;

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as it appears in `/Filter` (e.g. "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode a stream payload according to its dictionary.
///
/// `/Filter` may be a single name or an array; `/DecodeParms` may likewise
/// be a dictionary or an array aligned with the filters. Only the
/// parameters of the last filter are honoured, which is where predictors
/// live in practice.
pub fn decode_stream(dict: &Dictionary, data: &[u8], options: &ParserOptions) -> Result<Vec<u8>> {
    let filters = filter_names(dict.get("Filter"))?;
    let params = dict
        .get("DecodeParms")
        .and_then(|p| match p {
            Object::Array(items) => items.last(),
            other => Some(other),
        })
        .and_then(Object::as_dict)
        .map(DecodeParams::from_dict);

    let mut current = data.to_vec();
    for name in &filters {
        let decoder: Box<dyn StreamDecoder> = match name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        };
        current = decoder.decode(&current)?;

        if options.max_decompressed_size > 0 && current.len() > options.max_decompressed_size {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                options.max_decompressed_size
            )));
        }
    }

    match params {
        Some(params) if params.predictor > 1 => decode_predictor(&current, &params),
        _ => Ok(current),
    }
}

fn filter_names(filter: Option<&Object>) -> Result<Vec<String>> {
    match filter {
        None | Some(Object::Null) => Ok(Vec::new()),
        Some(Object::Name(name)) => Ok(vec![name.clone()]),
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_name()
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidObjectType {
                        expected: "Name".to_string(),
                        found: item.type_name().to_string(),
                    })
            })
            .collect(),
        Some(other) => Err(Error::InvalidObjectType {
            expected: "Name or Array".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}
