//! Stream decoders.
//!
//! The minimizer copies stream payloads verbatim, so decoding only happens
//! where the file structure itself is compressed (cross-reference streams and
//! object streams) or when a caller explicitly asks for decoded bytes.
//!
//! Supported filters: FlateDecode, ASCIIHexDecode, ASCII85Decode, plus the
//! PNG and TIFF predictors. Anything else is reported as
//! [`Error::UnsupportedFeature`].

use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;

mod ascii85;
mod ascii_hex;
mod flate;
mod predictor;

pub use ascii85::Ascii85Decoder;
pub use ascii_hex::AsciiHexDecoder;
pub(crate) use ascii_hex::hex_value;
pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// A single filter in a decode pipeline.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as it appears in `/Filter` (e.g. "FlateDecode").
    fn name(&self) -> &str;
}

fn decoder_for(filter: &str, options: &ParserOptions) -> Result<Box<dyn StreamDecoder>> {
    match filter {
        "FlateDecode" | "Fl" => Ok(Box::new(FlateDecoder {
            limit: options.max_decompressed_size,
        })),
        "ASCIIHexDecode" | "AHx" => Ok(Box::new(AsciiHexDecoder)),
        "ASCII85Decode" | "A85" => Ok(Box::new(Ascii85Decoder)),
        other => Err(Error::UnsupportedFeature(format!("stream filter /{}", other))),
    }
}

/// Decode stream data through a filter pipeline using default limits.
///
/// `params` holds one optional entry per filter, aligned with `filters`.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: &[Option<DecodeParams>],
) -> Result<Vec<u8>> {
    decode_stream_with_options(data, filters, params, &ParserOptions::default())
}

/// Decode stream data, enforcing the decompression limits in `options`.
pub fn decode_stream_with_options(
    data: &[u8],
    filters: &[String],
    params: &[Option<DecodeParams>],
    options: &ParserOptions,
) -> Result<Vec<u8>> {
    let encoded_len = data.len().max(1);
    let mut current = data.to_vec();

    for (i, filter) in filters.iter().enumerate() {
        let decoder = decoder_for(filter, options)?;
        current = decoder.decode(&current)?;

        if let Some(Some(p)) = params.get(i) {
            if p.predictor > 1 {
                current = decode_predictor(&current, p)?;
            }
        }

        let ratio = current.len() / encoded_len;
        if options.max_decompression_ratio > 0 && ratio > options.max_decompression_ratio as usize {
            return Err(Error::Decode(format!(
                "{} expanded {} bytes to {} (ratio limit {}:1)",
                decoder.name(),
                data.len(),
                current.len(),
                options.max_decompression_ratio
            )));
        }
        if options.max_decompressed_size > 0 && current.len() > options.max_decompressed_size {
            return Err(Error::Decode(format!(
                "decoded stream exceeds {} bytes",
                options.max_decompressed_size
            )));
        }
    }

    Ok(current)
}
