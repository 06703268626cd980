//! ASCIIHexDecode implementation.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCIIHexDecode filter.
///
/// Whitespace is ignored, `>` ends the data and an odd final digit is
/// padded with `0`.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;

        for &byte in input {
            if byte == b'>' {
                break;
            }
            if byte.is_ascii_whitespace() || byte == 0 {
                continue;
            }
            let nibble = hex_value(byte).ok_or_else(|| {
                Error::Decode(format!("ASCIIHexDecode: invalid digit 0x{:02X}", byte))
            })?;
            match high.take() {
                Some(h) => output.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }

        if let Some(h) = high {
            output.push(h << 4);
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// Value of an ASCII hex digit.
pub(crate) fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}
