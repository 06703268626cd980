//! Predictor post-processing for Flate-compressed streams.
//!
//! Cross-reference streams are almost always written with PNG Up prediction
//! (`/Predictor 12`), so this is on the hot path of opening any PDF 1.5 file.

use crate::error::{Error, Result};
use crate::object::Dictionary;

/// Decode parameters for stream decoders (`/DecodeParms`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
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
    /// Read parameters from a `/DecodeParms` dictionary, defaulting what is absent.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let int = |key: &str, default: i64| {
            dict.get(key)
                .and_then(|o| o.as_integer())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        Self {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1) as usize,
            colors: int("Colors", 1) as usize,
            bits_per_component: int("BitsPerComponent", 8) as usize,
        }
    }

    /// Bytes of sample data per row, excluding any PNG tag byte.
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Distance in bytes to the corresponding byte of the previous pixel.
    fn pixel_stride(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Undo the predictor named by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("unsupported predictor {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }

    let row_len = params.row_bytes();
    let stride = params.pixel_stride();
    let mut output = data.to_vec();

    for row in output.chunks_mut(row_len.max(1)) {
        for i in stride..row.len() {
            row[i] = row[i].wrapping_add(row[i - stride]);
        }
    }

    Ok(output)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_bytes();
    let stride = params.pixel_stride();
    let encoded_len = row_len + 1;

    if row_len == 0 {
        return Err(Error::Decode("PNG predictor with zero-width rows".to_string()));
    }

    let mut output = Vec::with_capacity(data.len() / encoded_len * row_len);
    let mut prev = vec![0u8; row_len];

    // A short final row is tolerated; writers in the wild truncate padding.
    for encoded in data.chunks(encoded_len) {
        let tag = encoded[0];
        let src = &encoded[1..];
        let mut row = vec![0u8; src.len()];

        for i in 0..src.len() {
            let left = if i >= stride { row[i - stride] } else { 0 };
            let up = prev[i];
            let up_left = if i >= stride { prev[i - stride] } else { 0 };

            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(Error::Decode(format!("invalid PNG row filter {}", other)));
                },
            };
            row[i] = src[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&row);
        prev[..row.len()].copy_from_slice(&row);
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_png_up_rows() {
        let params = DecodeParams {
            predictor: 12,
            columns: 4,
            ..Default::default()
        };
        let encoded = [2, 1, 0, 0, 9, 2, 0, 1, 0, 1];

        let decoded = decode_predictor(&encoded, &params).unwrap();
        assert_eq!(decoded, vec![1, 0, 0, 9, 1, 1, 0, 10]);
    }

    #[test]
    fn test_png_sub_and_paeth_per_row() {
        let params = DecodeParams {
            predictor: 15,
            columns: 3,
            ..Default::default()
        };
        // Row 0 Sub: 5, 5+1, 6+1. Row 1 Paeth against [5, 6, 7].
        let encoded = [1, 5, 1, 1, 4, 0, 0, 0];

        let decoded = decode_predictor(&encoded, &params).unwrap();
        assert_eq!(decoded, vec![5, 6, 7, 5, 6, 7]);
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 3,
            ..Default::default()
        };
        let decoded = decode_predictor(&[10, 1, 1, 20, 2, 2], &params).unwrap();
        assert_eq!(decoded, vec![10, 11, 12, 20, 22, 24]);
    }

    #[test]
    fn test_invalid_row_filter() {
        let params = DecodeParams {
            predictor: 12,
            columns: 1,
            ..Default::default()
        };
        assert!(decode_predictor(&[7, 0], &params).is_err());
    }

    #[test]
    fn test_from_dict_defaults() {
        let mut dict = Dictionary::new();
        dict.insert("Predictor".to_string(), Object::Integer(12));
        dict.insert("Columns".to_string(), Object::Integer(5));

        let params = DecodeParams::from_dict(&dict);
        assert_eq!(params.predictor, 12);
        assert_eq!(params.columns, 5);
        assert_eq!(params.colors, 1);
        assert_eq!(params.bits_per_component, 8);
        assert_eq!(params.row_bytes(), 5);
    }
}
