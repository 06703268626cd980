//! FlateDecode (zlib/deflate) implementation on top of `flate2`.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter.
///
/// `limit` caps the inflated size; 0 disables the cap.
pub struct FlateDecoder {
    /// Maximum number of output bytes
    pub limit: usize,
}

impl FlateDecoder {
    fn inflate<R: Read>(&self, reader: R, output: &mut Vec<u8>) -> std::io::Result<usize> {
        if self.limit == 0 {
            let mut reader = reader;
            reader.read_to_end(output)
        } else {
            // One byte past the cap so an overflow is observable.
            reader.take(self.limit as u64 + 1).read_to_end(output)
        }
    }

    fn check_limit(&self, output: &[u8]) -> Result<()> {
        if self.limit > 0 && output.len() > self.limit {
            return Err(Error::Decode(format!(
                "FlateDecode output exceeds {} bytes",
                self.limit
            )));
        }
        Ok(())
    }
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();

        match self.inflate(ZlibDecoder::new(input), &mut output) {
            Ok(_) => {
                self.check_limit(&output)?;
                Ok(output)
            },
            Err(e) if !output.is_empty() => {
                // Truncated or checksum-damaged streams still carry usable data.
                log::warn!("FlateDecode recovered {} bytes before error: {}", output.len(), e);
                self.check_limit(&output)?;
                Ok(output)
            },
            Err(zlib_err) => {
                log::debug!("zlib header rejected ({}), retrying as raw deflate", zlib_err);
                output.clear();
                match self.inflate(DeflateDecoder::new(input), &mut output) {
                    Ok(_) | Err(_) if !output.is_empty() => {
                        self.check_limit(&output)?;
                        Ok(output)
                    },
                    _ => Err(Error::Decode(format!("FlateDecode failed: {}", zlib_err))),
                }
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}
