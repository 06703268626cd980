//! PDF object serialization.
//!
//! Serializes PDF objects to their byte representation (ISO 32000-1:2008,
//! Section 7.3).

use crate::object::{Dictionary, Object};
use std::io::Write;

/// Serializer for PDF objects.
///
/// Output is deterministic: dictionary keys are written in sorted order and
/// reals keep their exact value, so the same object always produces the same
/// bytes.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a new object serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj)?;
        Ok(buf)
    }

    /// Write an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn write_indirect<W: Write>(&self, w: &mut W, id: u32, gen: u16, obj: &Object) -> std::io::Result<()> {
        writeln!(w, "{} {} obj", id, gen)?;
        self.write_object(w, obj)?;
        write!(w, "\nendobj\n")
    }

    /// Write a direct object.
    pub fn write_object<W: Write>(&self, w: &mut W, obj: &Object) -> std::io::Result<()> {
        match obj {
            Object::Null => write!(w, "null"),
            Object::Boolean(b) => write!(w, "{}", if *b { "true" } else { "false" }),
            Object::Integer(i) => write!(w, "{}", i),
            Object::Real(r) => self.write_real(w, *r),
            Object::String(s) => self.write_string(w, s),
            Object::Name(n) => self.write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => self.write_stream(w, dict, data),
            Object::Reference(r) => write!(w, "{} {} R", r.id, r.gen),
        }
    }

    /// Write a real number.
    ///
    /// Integral values are written without a decimal point. Others use the
    /// shortest decimal that reads back as the same `f64`, which never has an
    /// exponent.
    fn write_real<W: Write>(&self, w: &mut W, value: f64) -> std::io::Result<()> {
        if !value.is_finite() {
            log::warn!("Writing non-finite real {} as 0", value);
            return write!(w, "0");
        }
        if value.fract() == 0.0 && value.abs() < 1e15 {
            return write!(w, "{}", value as i64);
        }
        write!(w, "{}", value)
    }

    /// Write a PDF string.
    ///
    /// Printable text uses literal syntax `(...)` with escapes; anything else
    /// is written as a hex string `<...>`.
    fn write_string<W: Write>(&self, w: &mut W, data: &[u8]) -> std::io::Result<()> {
        let is_printable = data
            .iter()
            .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

        if is_printable {
            write!(w, "(")?;
            for &byte in data {
                match byte {
                    b'(' => write!(w, "\\(")?,
                    b')' => write!(w, "\\)")?,
                    b'\\' => write!(w, "\\\\")?,
                    b'\n' => write!(w, "\\n")?,
                    b'\r' => write!(w, "\\r")?,
                    b'\t' => write!(w, "\\t")?,
                    _ => w.write_all(&[byte])?,
                }
            }
            write!(w, ")")
        } else {
            write!(w, "<")?;
            for byte in data {
                write!(w, "{:02X}", byte)?;
            }
            write!(w, ">")
        }
    }

    /// Write a PDF name.
    ///
    /// Each char of a parsed name stands for one byte (code points up to
    /// U+00FF). Bytes outside `!`..`~`, delimiters and `#` are written as
    /// `#xx`. Chars above U+00FF, which only come from names built in code,
    /// are written as their escaped UTF-8 bytes.
    fn write_name<W: Write>(&self, w: &mut W, name: &str) -> std::io::Result<()> {
        write!(w, "/")?;
        let mut utf8 = [0u8; 4];
        for ch in name.chars() {
            let code = ch as u32;
            if code <= 0xFF {
                write_name_byte(w, code as u8)?;
            } else {
                for &byte in ch.encode_utf8(&mut utf8).as_bytes() {
                    write!(w, "#{:02X}", byte)?;
                }
            }
        }
        Ok(())
    }

    /// Write a PDF array.
    fn write_array<W: Write>(&self, w: &mut W, arr: &[Object]) -> std::io::Result<()> {
        write!(w, "[")?;
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                write!(w, " ")?;
            }
            self.write_object(w, obj)?;
        }
        write!(w, "]")
    }

    /// Write a PDF dictionary with keys in sorted order.
    fn write_dictionary<W: Write>(&self, w: &mut W, dict: &Dictionary) -> std::io::Result<()> {
        write!(w, "<<")?;

        let mut entries: Vec<_> = dict.iter().filter(|(_, v)| !v.is_null()).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (key, value) in &entries {
            if self.compact {
                write!(w, " ")?;
            } else {
                write!(w, "\n  ")?;
            }
            self.write_name(w, key)?;
            write!(w, " ")?;
            self.write_object(w, value)?;
        }

        if entries.is_empty() {
            write!(w, ">>")
        } else if self.compact {
            write!(w, " >>")
        } else {
            write!(w, "\n>>")
        }
    }

    /// Write a PDF stream. `/Length` is always the actual payload size.
    fn write_stream<W: Write>(&self, w: &mut W, dict: &Dictionary, data: &[u8]) -> std::io::Result<()> {
        let mut dict_with_length = dict.clone();
        dict_with_length.insert("Length".to_string(), Object::Integer(data.len() as i64));

        self.write_dictionary(w, &dict_with_length)?;
        write!(w, "\nstream\n")?;
        w.write_all(data)?;
        write!(w, "\nendstream")
    }
}

fn write_name_byte<W: Write>(w: &mut W, byte: u8) -> std::io::Result<()> {
    match byte {
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#' => {
            write!(w, "#{:02X}", byte)
        },
        b'!'..=b'~' => w.write_all(&[byte]),
        _ => write!(w, "#{:02X}", byte),
    }
}

/// Helper functions for building PDF objects.
impl ObjectSerializer {
    /// Create a Name object.
    pub fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    /// Create a String object from a Rust string.
    pub fn string(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec())
    }

    /// Create a Dictionary object from key-value pairs.
    pub fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}
