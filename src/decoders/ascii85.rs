//! ASCII85Decode implementation.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCII85Decode filter.
///
/// Five characters in `!`..=`u` encode four bytes; `z` stands for four zero
/// bytes and `~>` terminates the data.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut len = 0usize;

        let body = input.strip_prefix(b"<~").unwrap_or(input);

        for &byte in body {
            match byte {
                b'~' => break,
                b'z' if len == 0 => output.extend_from_slice(&[0; 4]),
                b'z' => {
                    return Err(Error::Decode("ASCII85Decode: 'z' inside a group".to_string()));
                },
                b'!'..=b'u' => {
                    group[len] = byte - b'!';
                    len += 1;
                    if len == 5 {
                        output.extend_from_slice(&group_value(&group)?.to_be_bytes());
                        len = 0;
                    }
                },
                _ if byte.is_ascii_whitespace() || byte == 0 => {},
                _ => {
                    return Err(Error::Decode(format!(
                        "ASCII85Decode: invalid character 0x{:02X}",
                        byte
                    )));
                },
            }
        }

        match len {
            0 => {},
            1 => {
                return Err(Error::Decode("ASCII85Decode: dangling single character".to_string()));
            },
            n => {
                // Pad with 'u' and keep n - 1 bytes.
                for slot in group.iter_mut().skip(n) {
                    *slot = 84;
                }
                let bytes = group_value(&group)?.to_be_bytes();
                output.extend_from_slice(&bytes[..n - 1]);
            },
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + digit as u64);
    u32::try_from(value).map_err(|_| Error::Decode("ASCII85Decode: group overflow".to_string()))
}
